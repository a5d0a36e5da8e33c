use std::sync::atomic::{AtomicU8, Ordering};

/// How much the scraper prints besides warnings and the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet = 0,
    Normal = 1,
    Debug = 2,
}

static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

impl Verbosity {
    /// Reads `AUTOFINDER_LOG` style values: a level name or its number.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "quiet" => Some(Verbosity::Quiet),
            "1" | "normal" => Some(Verbosity::Normal),
            "2" | "debug" => Some(Verbosity::Debug),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Verbosity::Quiet,
            1 => Verbosity::Normal,
            _ => Verbosity::Debug,
        }
    }
}

pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

pub fn verbosity() -> Verbosity {
    Verbosity::from_u8(VERBOSITY.load(Ordering::Relaxed))
}

/// Per-request and per-flush progress lines.
pub fn is_status_enabled() -> bool {
    verbosity() >= Verbosity::Normal
}

pub fn is_debug_enabled() -> bool {
    verbosity() >= Verbosity::Debug
}

/// Applies `AUTOFINDER_LOG` if it holds a known level. Returns the level set.
pub fn init_from_env() -> Option<Verbosity> {
    let level = std::env::var("AUTOFINDER_LOG").ok().and_then(|v| Verbosity::parse(&v))?;
    set_verbosity(level);
    Some(level)
}

#[macro_export]
macro_rules! status_println {
    ($($arg:tt)*) => {
        if $crate::debug::is_status_enabled() {
            println!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            println!("[debug] {}", format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! debug_eprintln {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            eprintln!("[debug] {}", format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!(Verbosity::parse("quiet"), Some(Verbosity::Quiet));
        assert_eq!(Verbosity::parse(" DEBUG "), Some(Verbosity::Debug));
        assert_eq!(Verbosity::parse("1"), Some(Verbosity::Normal));
        assert_eq!(Verbosity::parse("loud"), None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Verbosity::Debug > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);
        assert_eq!(Verbosity::from_u8(Verbosity::Quiet as u8), Verbosity::Quiet);
    }
}
