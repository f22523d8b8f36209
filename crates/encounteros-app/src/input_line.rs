//! Parsing of terminal input lines.
//!
//! A plain line names a key chord (`F5`, `Shift++`, `Ctrl+R`). A line that
//! starts with `{` is either a forwarded input in its wire format or a
//! `{"preferences": {...}}` object replacing the display preferences.

use encounteros_core::error::DomainError;
use encounteros_input::application::router::ForwardedInput;
use encounteros_input::domain::keymap::KeyChord;
use encounteros_sync::display_preferences::DisplayPreferences;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// A local key press.
    Key(KeyChord),
    /// Input relayed by the external hotkey forwarder.
    Forwarded(ForwardedInput),
    /// New display preferences.
    Preferences(DisplayPreferences),
}

/// Parses a line; blank lines yield `None`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the line is none of the accepted
/// forms.
pub fn parse_input_line(line: &str) -> Result<Option<InputLine>, DomainError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('{') {
        return line.parse::<KeyChord>().map(|chord| Some(InputLine::Key(chord)));
    }

    let mut value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| DomainError::Validation(format!("invalid input object: {e}")))?;
    if let Some(preferences) = value.get_mut("preferences").map(serde_json::Value::take) {
        return serde_json::from_value(preferences)
            .map(|p| Some(InputLine::Preferences(p)))
            .map_err(|e| DomainError::Validation(format!("invalid display preferences: {e}")));
    }
    serde_json::from_value(value)
        .map(|input| Some(InputLine::Forwarded(input)))
        .map_err(|e| DomainError::Validation(format!("invalid forwarded input: {e}")))
}

/// Line reader that never fails on bad encoding: bytes that are not UTF-8
/// are replaced, so the line is rejected by the parser instead of ending
/// the input stream.
#[derive(Debug)]
pub struct InputReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> InputReader<R> {
    /// Wraps a byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    ///
    /// Safe to cancel in `tokio::select!`: a partly read line is kept and
    /// completed by the next call.
    ///
    /// # Errors
    ///
    /// Returns the underlying read error.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.inner.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use encounteros_input::domain::actions::Action;
    use encounteros_input::domain::keymap::KeyCode;
    use encounteros_sync::display_preferences::ImageFit;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_key_chord_line() {
        let parsed = parse_input_line("  F5 \n").unwrap();

        assert_eq!(parsed, Some(InputLine::Key(KeyChord::plain(KeyCode::F(5)))));
    }

    #[test]
    fn test_forwarded_line() {
        let delivery_id = Uuid::new_v4();
        let line = format!(
            r#"{{"delivery_id":"{delivery_id}","target":"display","action":"adjust_selected_hp","delta":-5}}"#
        );

        let parsed = parse_input_line(&line).unwrap();

        assert_eq!(
            parsed,
            Some(InputLine::Forwarded(ForwardedInput {
                delivery_id,
                target: "display".into(),
                action: Action::AdjustSelectedHp { delta: -5 },
            }))
        );
    }

    #[test]
    fn test_preferences_line() {
        let parsed =
            parse_input_line(r#"{"preferences":{"theme":"parchment","fit":"cover"}}"#).unwrap();

        assert_eq!(
            parsed,
            Some(InputLine::Preferences(DisplayPreferences {
                theme: "parchment".into(),
                fit: ImageFit::Cover,
                ..DisplayPreferences::default()
            }))
        );
    }

    #[test]
    fn test_blank_line_is_none() {
        assert_eq!(parse_input_line("   ").unwrap(), None);
    }

    #[test]
    fn test_malformed_forwarded_line_is_validation_error() {
        let result = parse_input_line(r#"{"target":"display"}"#);

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("forwarded input")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_preferences_line_is_validation_error() {
        let result = parse_input_line(r#"{"preferences":{"fit":"zoom"}}"#);

        match result.unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("display preferences")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reader_survives_invalid_utf8() {
        // Arrange
        let mut reader = InputReader::new(&b"F6\n\xff\xfe\r\nF5"[..]);

        // Act
        let first = reader.next_line().await.unwrap();
        let garbled = reader.next_line().await.unwrap();
        let last = reader.next_line().await.unwrap();
        let end = reader.next_line().await.unwrap();

        // Assert
        assert_eq!(first.as_deref(), Some("F6"));
        assert_eq!(garbled.as_deref(), Some("\u{FFFD}\u{FFFD}"));
        assert_eq!(last.as_deref(), Some("F5"));
        assert_eq!(end, None);
        assert!(matches!(
            parse_input_line(&garbled.unwrap()),
            Err(DomainError::Validation(_))
        ));
    }
}
