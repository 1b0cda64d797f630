//! Terminal output for the pair demo

use console::style;
use fitlink_pairing_sdk::{PairingEvent, PairingSession};

/// Explain what the user has to do during `pair`
pub fn display_pair_instructions() {
    println!();
    println!("{}", style("Fitlink device pairing").bold().cyan());
    println!(
        "{}",
        style("Approve access in the browser, then paste the URL you land on here.").dim()
    );
    println!("{}", style("Press Ctrl-C to cancel.").dim());
    println!();
}

/// Show the consent URL so it can be opened by hand
pub fn display_consent_url(url: &str) {
    println!("  {} {}", style("Consent page:").yellow().bold(), url);
}

/// Render a terminal pairing event
pub fn display_event(event: &PairingEvent) {
    match event {
        PairingEvent::Connected => display_success("Device paired"),
        PairingEvent::Failed { message, .. } => {
            eprintln!("{} {}", style("✗").red().bold(), style(message).red());
        }
        PairingEvent::Reset => println!("{}", style("Pairing cancelled").dim()),
    }
}

/// One green line
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// `label: yes/no`
pub fn display_status_line(label: &str, value: bool) {
    let value = if value {
        style("yes").green()
    } else {
        style("no").red()
    };
    println!("  {} {}", style(format!("{label}:")).bold(), value);
}

/// Local state summary
pub fn display_status(signed_in: bool, paired: bool, pending: Option<&PairingSession>) {
    println!();
    display_status_line("Signed in", signed_in);
    display_status_line("Paired", paired);
    if let Some(session) = pending {
        println!(
            "  {} started {}s ago",
            style("Pending session:").bold(),
            session.age().as_secs()
        );
    }
    println!();
}
