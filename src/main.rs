mod rsa;

use clap::Parser;
use log::LevelFilter;
use crate::rsa::Cli;

fn main() {
    let cli = Cli::parse();
    let mut logger = env_logger::builder();
    if cli.silent {
        logger.filter_level(LevelFilter::Off);
    } else {
        logger.filter_level(LevelFilter::Info).parse_default_env();
    }
    logger.init();
    if let Err(e) = cli.run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use crate::rsa::{Cli, Command};
    use crate::rsa::config::CONFIG_DEF;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_gen() {
        let cli = Cli::try_parse_from(["messenger", "keyGen", "1024"]).unwrap();
        assert!(matches!(cli.command, Command::KeyGen { bits: 1024 }));
        assert_eq!(cli.key_dir, CONFIG_DEF.key_dir);
        assert_eq!(cli.threads, CONFIG_DEF.threads);
        assert_eq!(cli.rounds, CONFIG_DEF.rounds);
        assert!(!cli.silent);
    }

    #[test]
    fn test_parse_send_msg_with_globals() {
        let cli = Cli::try_parse_from([
            "messenger", "--silent", "sendMsg", "bob@example.com", "hello there", "-t", "2", "-k", "/tmp/keys",
        ]).unwrap();
        match cli.command {
            Command::SendMsg { email, plaintext } => {
                assert_eq!(email, "bob@example.com");
                assert_eq!(plaintext, "hello there");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(cli.silent);
        assert_eq!(cli.threads, 2);
        assert_eq!(cli.key_dir, "/tmp/keys");
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert!(Cli::try_parse_from(["messenger", "getMsg"]).is_err());
        assert!(Cli::try_parse_from(["messenger", "keyGen", "lots"]).is_err());
        assert!(Cli::try_parse_from(["messenger", "unknown"]).is_err());
    }
}
