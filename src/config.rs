//! Runtime settings for the `miniskim` binary.
//!
//! Defaults are overridden by environment variables, which are in turn
//! overridden by command-line arguments:
//!
//! | variable | meaning |
//! |---|---|
//! | `MINISKIM_MAX_DEPTH` | evaluation depth limit |
//! | `MINISKIM_STACK_MB` | worker thread stack size in MiB |
//! | `MINISKIM_BOOTSTRAP` | bootstrap file path, or `none` to skip it |
//! | `MINISKIM_ECHO` | `1` to print every result of a program file |
//! | `MINISKIM_PRECISION` | fixed decimal places when printing numbers |
//!
//! Usage: `miniskim [--no-bootstrap] [--bootstrap PATH] [--echo] [FILE]`

use std::path::PathBuf;

use crate::MAX_EVAL_DEPTH;
use crate::evaluator::EvalLimits;

/// Default worker thread stack, sized so that [`MAX_EVAL_DEPTH`] is reached
/// well before the native stack runs out
pub const DEFAULT_STACK_MB: usize = 256;

/// Source unit evaluated before the program or REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// The prelude compiled into the binary
    Embedded,
    File(PathBuf),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_depth: usize,
    pub stack_size_mb: usize,
    pub bootstrap: Bootstrap,
    pub echo_results: bool,
    /// Print numbers with this many decimals instead of round-trip form
    pub precision: Option<usize>,
    /// Program file; the REPL runs when absent
    pub program: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("{0} requires an argument")]
    MissingArgument(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("unexpected argument: {0} (only one program file is accepted)")]
    UnexpectedArgument(String),
    #[error("stack size of {0} MiB is too large")]
    StackTooLarge(usize),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: MAX_EVAL_DEPTH,
            stack_size_mb: DEFAULT_STACK_MB,
            bootstrap: Bootstrap::Embedded,
            echo_results: false,
            precision: None,
            program: None,
        }
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            name: name.to_owned(),
            value: value.to_owned(),
        })
}

impl Config {
    /// Defaults, then the process environment, then `args` (without argv[0])
    pub fn from_env_and_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        config.apply_args(args)?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MINISKIM_MAX_DEPTH") {
            self.max_depth = parse_number("MINISKIM_MAX_DEPTH", &v)?;
        }
        if let Some(v) = lookup("MINISKIM_STACK_MB") {
            self.stack_size_mb = parse_number("MINISKIM_STACK_MB", &v)?;
        }
        if let Some(v) = lookup("MINISKIM_BOOTSTRAP") {
            self.bootstrap = match v.trim() {
                "none" => Bootstrap::None,
                "" => Bootstrap::Embedded,
                path => Bootstrap::File(PathBuf::from(path)),
            };
        }
        if let Some(v) = lookup("MINISKIM_ECHO") {
            self.echo_results = v.trim() == "1";
        }
        if let Some(v) = lookup("MINISKIM_PRECISION") {
            self.precision = Some(parse_number("MINISKIM_PRECISION", &v)?);
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_args<I>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--no-bootstrap" => self.bootstrap = Bootstrap::None,
                "--bootstrap" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingArgument(arg.clone()))?;
                    self.bootstrap = Bootstrap::File(PathBuf::from(path));
                }
                "--echo" => self.echo_results = true,
                flag if flag.starts_with("--") => {
                    return Err(ConfigError::UnknownOption(flag.to_owned()));
                }
                _ if self.program.is_some() => {
                    return Err(ConfigError::UnexpectedArgument(arg.clone()));
                }
                _ => self.program = Some(PathBuf::from(&arg)),
            }
        }
        Ok(())
    }

    pub fn limits(&self) -> EvalLimits {
        EvalLimits {
            max_depth: self.max_depth,
        }
    }

    pub fn stack_size_bytes(&self) -> Result<usize, ConfigError> {
        self.stack_size_mb
            .checked_mul(1024 * 1024)
            .ok_or(ConfigError::StackTooLarge(self.stack_size_mb))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_depth, MAX_EVAL_DEPTH);
        assert_eq!(config.bootstrap, Bootstrap::Embedded);
        assert_eq!(config.program, None);
        assert_eq!(config.limits(), EvalLimits::default());
        assert_eq!(config.stack_size_bytes().unwrap(), 256 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env_from(&[
                ("MINISKIM_MAX_DEPTH", "500"),
                ("MINISKIM_STACK_MB", " 64 "),
                ("MINISKIM_BOOTSTRAP", "init.scm"),
                ("MINISKIM_ECHO", "1"),
                ("MINISKIM_PRECISION", "2"),
            ]))
            .unwrap();
        assert_eq!(config.max_depth, 500);
        assert_eq!(config.stack_size_mb, 64);
        assert_eq!(config.bootstrap, Bootstrap::File(PathBuf::from("init.scm")));
        assert!(config.echo_results);
        assert_eq!(config.precision, Some(2));

        config
            .apply_env(env_from(&[("MINISKIM_BOOTSTRAP", "none")]))
            .unwrap();
        assert_eq!(config.bootstrap, Bootstrap::None);
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_from(&[("MINISKIM_MAX_DEPTH", "lots")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid MINISKIM_MAX_DEPTH: lots".to_owned()
        );
    }

    #[test]
    fn test_args_override_env() {
        let mut config = Config::default();
        config
            .apply_env(env_from(&[("MINISKIM_BOOTSTRAP", "init.scm")]))
            .unwrap();
        config
            .apply_args(args(&["--no-bootstrap", "prog.scm"]))
            .unwrap();
        assert_eq!(config.bootstrap, Bootstrap::None);
        assert_eq!(config.program, Some(PathBuf::from("prog.scm")));

        config
            .apply_args(args(&["--bootstrap", "other.scm", "--echo"]))
            .unwrap();
        assert_eq!(config.bootstrap, Bootstrap::File(PathBuf::from("other.scm")));
        assert!(config.echo_results);
    }

    #[test]
    fn test_arg_errors() {
        let test_cases = vec![
            (
                args(&["--bootstrap"]),
                ConfigError::MissingArgument("--bootstrap".into()),
            ),
            (
                args(&["--verbose"]),
                ConfigError::UnknownOption("--verbose".into()),
            ),
            (
                args(&["a.scm", "b.scm"]),
                ConfigError::UnexpectedArgument("b.scm".into()),
            ),
        ];
        for (input, expected) in test_cases {
            let mut config = Config::default();
            assert_eq!(config.apply_args(input).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_stack_size_overflow() {
        let config = Config {
            stack_size_mb: usize::MAX,
            ..Config::default()
        };
        assert_eq!(
            config.stack_size_bytes().unwrap_err(),
            ConfigError::StackTooLarge(usize::MAX)
        );
    }
}
