//! Terminal rendering of controller output.

use lytchat::backend::{Message, Role};
use lytchat::guard::Operation;
use lytchat::view::{ChatView, Notice};

/// Prints transcript changes to stdout and notices to stderr.
pub struct TerminalView;

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("> {}", message.content),
        Role::Assistant => println!("< {}", message.content.trim()),
        Role::System => println!("* {}", message.content),
        Role::Error => eprintln!("! {}", message.content),
        Role::Sources => {
            println!("  sources:");
            for line in message.content.lines() {
                println!("    {}", line);
            }
        }
    }
}

impl ChatView for TerminalView {
    fn render_transcript(&self, messages: &[Message]) {
        for message in messages {
            print_message(message);
        }
    }

    fn append_message(&self, message: &Message) {
        // The user already sees what they typed.
        if message.role != Role::User {
            print_message(message);
        }
    }

    fn show_placeholder(&self, text: &str) {
        println!("  {}", text);
    }

    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::Info(text) => println!("* {}", text),
            Notice::Error(text) => eprintln!("error: {}", text),
        }
    }

    fn set_control_enabled(&self, op: Operation, enabled: bool) {
        log::trace!("{} {}", op, if enabled { "enabled" } else { "disabled" });
    }
}
