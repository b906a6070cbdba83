use clap::{Parser, Subcommand};
use std::time::Duration;
use termbg_common::{ErrorReporting, IpcClient, IpcCommand, IpcResponse, TermbgError};

#[derive(Parser)]
#[command(name = "termbg-cli")]
#[command(about = "termbg (terminal background image rotation control)")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List background profiles, marking the active one
    Profiles,

    /// Make a profile the default and rotate every window
    Use {
        /// Profile name from backgroundImage.profiles
        name: String,
    },

    /// Rotate the background in every window
    Next,

    /// Open the images currently on screen
    View,

    /// Reload configuration
    Reload,

    /// Show current status
    Status,
}

fn main() {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Profiles => IpcCommand::Menu,
        Commands::Use { name } => IpcCommand::SelectProfile { name },
        Commands::Next => IpcCommand::NextImage,
        Commands::View => IpcCommand::ViewCurrentImage,
        Commands::Reload => IpcCommand::Reload,
        Commands::Status => IpcCommand::Status,
    };

    match IpcClient::new().send_command(command) {
        Ok(response) => print_response(response),
        Err(e) => {
            match e.downcast_ref::<TermbgError>() {
                Some(termbg_error) => eprintln!("Error: {}", termbg_error.user_friendly_message()),
                None => eprintln!("Error: {:#}", e),
            }
            std::process::exit(1);
        }
    }
}

fn print_response(response: IpcResponse) {
    match response {
        IpcResponse::Success { message } => {
            println!("✓ {}", message);
        }

        IpcResponse::Error { message } => {
            eprintln!("✗ Error: {}", message);
            std::process::exit(1);
        }

        IpcResponse::Menu(menu) => {
            if menu.profiles.is_empty() {
                println!("No background profiles configured");
                return;
            }

            for entry in &menu.profiles {
                let marker = if entry.checked { "*" } else { " " };
                println!("{} {}", marker, entry.name);
            }
            println!();
            println!("Next image: {}", menu.next_image_accelerator);
        }

        IpcResponse::Status(status) => {
            println!("termbg Status:");
            println!("==============");
            println!("Profile: {}", status.default_profile);
            println!("Windows: {}", status.windows);

            let interval = status
                .interval_secs
                .map(|secs| humantime::format_duration(Duration::from_secs(secs)).to_string())
                .unwrap_or_else(|| "no timer".to_string());
            println!("Interval: {}", interval);

            if status.current_images.is_empty() {
                println!("Current: None");
            } else {
                for image in &status.current_images {
                    println!("Current: {}", image.display());
                }
            }
        }
    }
}
