//! Shared helpers for the filedrop command-line tools.

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// The key given on the command line, or else the first line of `input`.
pub fn key_from_args_or_input(arg: Option<String>, input: &str) -> Option<String> {
    arg.or_else(|| input.lines().next().map(str::to_string))
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_wins_over_input() {
        assert_eq!(
            key_from_args_or_input(Some("abc".to_string()), "def\n"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn first_input_line_is_used() {
        assert_eq!(
            key_from_args_or_input(None, "  secret \nignored\n"),
            Some("secret".to_string())
        );
    }

    #[test]
    fn blank_key_is_none() {
        assert_eq!(key_from_args_or_input(None, ""), None);
        assert_eq!(key_from_args_or_input(Some("   ".to_string()), "x"), None);
    }
}
