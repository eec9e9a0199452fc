use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Wildcard byte position in a parameterized table entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
pub enum Wildcard {
    #[strum(serialize = "XX")]
    X,
    #[strum(serialize = "YY")]
    Y,
}

impl Wildcard {
    pub fn placeholder(&self) -> &'static str {
        self.into()
    }
}

/// A decoded unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// Printable symbol; may span several characters (dictionary entries).
    Char(String),
    /// Fixed control code such as `<END>` or `<NEWLINE>`.
    Control(String),
    /// Control code with captured parameter bytes, e.g. `<DELAY:XX>` with `XX=05`.
    Param {
        template: String,
        args: Vec<(Wildcard, u8)>,
    },
    /// Placeholder for a byte the table could not decode.
    Unknown(u8),
}

impl Token {
    pub fn char<S: Into<String>>(symbol: S) -> Self {
        Token::Char(symbol.into())
    }

    pub fn control<S: Into<String>>(name: S) -> Self {
        Token::Control(name.into())
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Token::Control(_) | Token::Param { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Token::Unknown(_))
    }

    /// Name used when comparing control codes between original and translation.
    /// Parameterized tokens compare by template *and* arguments.
    pub fn control_key(&self) -> Option<String> {
        match self {
            Token::Control(name) => Some(name.clone()),
            Token::Param { .. } => Some(self.to_string()),
            _ => None,
        }
    }

    pub fn arg(&self, wildcard: Wildcard) -> Option<u8> {
        match self {
            Token::Param { args, .. } => args
                .iter()
                .find(|(w, _)| *w == wildcard)
                .map(|(_, value)| *value),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Char(symbol) => f.write_str(symbol),
            Token::Control(name) => f.write_str(name),
            Token::Param { template, args } => {
                let mut rendered = template.clone();
                for (wildcard, value) in args {
                    rendered = rendered.replace(wildcard.placeholder(), &format!("{:02X}", value));
                }
                f.write_str(&rendered)
            }
            Token::Unknown(byte) => write!(f, "<UNK:{:02X}>", byte),
        }
    }
}

/// Render a token sequence as editable text.
pub fn render_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(Token::to_string).collect()
}

/// Match `text` against a parameterized template, capturing wildcard values.
pub(crate) fn match_template(template: &str, text: &str) -> Option<Vec<(Wildcard, u8)>> {
    let template = template.as_bytes();
    let text = text.as_bytes();
    let mut args = Vec::new();
    let (mut ti, mut xi) = (0, 0);

    while ti < template.len() {
        let wildcard =
            Wildcard::iter().find(|w| template[ti..].starts_with(w.placeholder().as_bytes()));

        match wildcard {
            Some(w) => {
                let digits = text.get(xi..xi + 2)?;
                let digits = std::str::from_utf8(digits).ok()?;
                let value = u8::from_str_radix(digits, 16).ok()?;
                args.push((w, value));
                ti += 2;
                xi += 2;
            }
            None => {
                if text.get(xi) != Some(&template[ti]) {
                    return None;
                }
                ti += 1;
                xi += 1;
            }
        }
    }

    (xi == text.len()).then_some(args)
}
