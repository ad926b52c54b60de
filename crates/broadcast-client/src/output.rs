//! Output formatting for the `acc-broadcast` binary

use acc_broadcast_client::ClientEvent;
use acc_broadcast_protocol::{EntryListSnapshot, Notification};
use anyhow::Error;
use colored::*;
use serde_json::json;

/// Print error in JSON format
///
/// Written as a single line so it stays parseable alongside the JSON event
/// lines printed by [`print_event`].
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string(&error_json) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format error as JSON: {}", e),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print one runner event, as a JSON line or a human-readable line
pub fn print_event(event: &ClientEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to format event as JSON: {}", e),
        }
        return;
    }

    match event {
        ClientEvent::Notification(notification) => print_notification_human(notification),
        ClientEvent::FrameDropped { error } => {
            println!("{} {}", "Dropped frame:".yellow(), error);
        }
    }
}

fn print_notification_human(notification: &Notification) {
    match notification {
        Notification::Registered {
            connection_id,
            readonly,
        } => {
            let access = if *readonly { "read-only" } else { "read/write" };
            println!(
                "{} connection {} ({})",
                "Registered".green().bold(),
                connection_id,
                access
            );
        }
        Notification::RegistrationRejected { message } => {
            println!("{} {}", "Registration rejected:".red().bold(), message);
        }
        Notification::EntryListReplaced {
            generation,
            car_count,
        } => {
            println!(
                "{} {} cars (generation {})",
                "Entry list:".bold(),
                car_count,
                generation
            );
        }
        Notification::CarUpdated { car_index } => {
            println!("  {} car {}", "Updated".cyan(), car_index);
        }
        Notification::Unhandled {
            message_type,
            payload,
        } => {
            println!(
                "  {}",
                format!("{} ({} bytes)", message_type, payload.len()).dimmed()
            );
        }
    }
}

/// Print the entry list in specified format
pub fn print_entry_list(entry_list: &EntryListSnapshot, json: bool) {
    if json {
        let output = json!({
            "success": true,
            "entry_list": entry_list
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to format entry list as JSON: {}", e),
        }
        return;
    }

    if entry_list.is_empty() {
        println!("{}", "No entry list received".yellow());
        return;
    }

    println!(
        "{} ({} cars, generation {})",
        "Entry List:".bold(),
        entry_list.len(),
        entry_list.generation()
    );
    for car in entry_list.cars() {
        if !car.is_populated() {
            println!("  {:>4}  {}", car.car_index, "(no details)".dimmed());
            continue;
        }

        let driver = car
            .current_driver()
            .map(|d| format!("{} {} [{}]", d.first_name, d.last_name, d.short_name))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>4}  #{:<4} {:<28} {}",
            car.car_index,
            car.race_number,
            car.team_name.bold(),
            driver
        );
    }
}
