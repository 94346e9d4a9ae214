//! Small helpers shared by the engines, the crawler and the CLI.
//!
//! - **URL validation**: channel URLs are checked before they are stored,
//!   item links before they are keyed
//! - **XML sanitizing**: control-character stripping and bare-ampersand
//!   escaping for the raw XML engine

mod text;
mod url_validator;

pub use text::{escape_bare_ampersands, is_blank, sanitize_xml, strip_xml_control_chars};
pub use url_validator::{is_item_link, validate_channel_url, ChannelUrlError};
