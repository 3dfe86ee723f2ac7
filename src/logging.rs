use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;

use crate::error::{Result, ViewerError};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    fn console_log(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = warn)]
    fn console_warn(s: &str);

    #[wasm_bindgen(js_namespace = console, js_name = error)]
    fn console_error(s: &str);
}

/// Forwards `log` records to the browser console.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{} {}] {}", record.level(), record.target(), record.args());
        match record.level() {
            Level::Error => console_error(&line),
            Level::Warn => console_warn(&line),
            _ => console_log(&line),
        }
    }

    fn flush(&self) {}
}

/// `"info"`, `"DEBUG"`, `"off"`, ... Blank means `info`.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    let level = level.trim();
    if level.is_empty() {
        return Ok(LevelFilter::Info);
    }
    level
        .parse()
        .map_err(|_| ViewerError::InvalidOptions(format!("unknown log level '{level}'")))
}

/// Install the console logger. Calling again only changes the level.
pub fn init(level: LevelFilter) {
    // set_logger fails once a logger is installed, which is fine here
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
        assert_eq!(parse_level("").unwrap(), LevelFilter::Info);
        assert!(matches!(
            parse_level("loud"),
            Err(ViewerError::InvalidOptions(_))
        ));
    }
}
