use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 20] = [
        "RUST_LOG",
        "SPS_HOST",
        "SPS_PORT",
        "SPS_DATABASE_URL",
        "SPS_STRIPE_API_BASE",
        "SPS_STRIPE_TIMEOUT_SECS",
        "SPS_WEBHOOK_TOLERANCE_SECS",
        "SPS_CONNECT_REFRESH_URL",
        "SPS_CONNECT_RETURN_URL",
        "SPS_TEST_MODE",
        "SPS_ALLOW_REQUEST_TEST_MODE",
        "SPS_SIMULATED_PAYMENT_DELAY_MS",
        "SPS_PLATFORM_FEE_BPS",
        "SPS_PLATFORM_FEE_FLAT_CENTS",
        "SPS_DISPATCH_TIMEOUT_SECS",
        "SPS_CANCEL_MAX_ATTEMPTS",
        "SPS_CANCEL_BACKOFF_MS",
        "SPS_DISPATCH_EXPIRY_MINS",
        "SPS_SWEEPER_INTERVAL_SECS",
        "SPS_STALE_ATTEMPT_MINS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
