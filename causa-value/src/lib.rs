//! The recursive `Value` tree shared by the configuration reader, the
//! template renderer and the function registry.
//!
//! Every layer of configuration, every template result, and every
//! function call argument map is represented as a [`Value`]. The type is
//! intentionally small: null, bool, number, string, ordered list, or an
//! ordered string-keyed map.

mod merge;
mod path;
pub mod template;
mod value;

pub use merge::merge;
pub use path::{get_path, path_segments, PathSegment};
pub use template::{contains_rendering_object, is_template_object, template_format_string, DEFAULT_TEMPLATE_MARKER};
pub use value::{Map, Value};
