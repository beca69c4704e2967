pub mod terminal {
    //! Utilities for Terminal I/O
    use std::fmt;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
    /// Write to stdout with the given foreground color
    pub fn write_with_col<T: fmt::Display>(item: T, color: Option<Color>) -> fmt::Result {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        if stdout.set_color(ColorSpec::new().set_fg(color)).is_err() {
            return Err(fmt::Error);
        }
        if write!(&mut stdout, "{}", item).is_err() {
            return Err(fmt::Error);
        }
        if stdout.reset().is_err() {
            return Err(fmt::Error);
        }
        Ok(())
    }
    pub fn write_info<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Cyan))
    }
    pub fn write_warning<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Yellow))
    }
    pub fn write_error<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Red))
    }
    pub fn write_success<T: fmt::Display>(item: T) -> fmt::Result {
        write_with_col(item, Some(Color::Green))
    }
}
