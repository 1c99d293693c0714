//! Host values stored in the object heap, and the host callbacks the module
//! can reach through its imports.

use std::fmt;
use std::rc::Rc;

use tracing::info;

/// Something the module can draw glyphs on.
///
/// The module only ever borrows a display, so implementations take `&self`
/// and use interior mutability for their own state.
pub trait DisplaySurface {
    fn draw(&self, x: i32, y: i32, glyph: &str, color: Option<&str>);
}

/// Host-side handlers for module notifications.
pub trait HostHandlers {
    /// A user-facing message.
    fn alert(&mut self, message: &str);

    /// A diagnostic message.
    fn log(&mut self, message: &str) {
        info!(target: "rogue::module", "{message}");
    }

    /// The module published a new stats record.
    fn stats_updated(&mut self, stats: serde_json::Value);
}

/// A value held in a heap slot.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Json(serde_json::Value),
    Display(Rc<dyn DisplaySurface>),
}

impl HostValue {
    pub fn display(surface: Rc<dyn DisplaySurface>) -> Self {
        Self::Display(surface)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Json(_) => "json",
            Self::Display(_) => "display",
        }
    }

    /// The JSON payload, if this is a JSON value.
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_display(&self) -> Option<&Rc<dyn DisplaySurface>> {
        match self {
            Self::Display(surface) => Some(surface),
            _ => None,
        }
    }

    /// Structural equality for everything but displays, which compare by
    /// identity.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Display(a), Self::Display(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Display(surface) => write!(f, "Display({:p})", Rc::as_ptr(surface)),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
