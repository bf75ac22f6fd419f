//! HTML templates with `{{path}}` expressions and custom tag and
//! attribute directives, compiled once and rendered into live node
//! trees that follow changes of an observable scope.
//!
//! ```
//! use webi::{Observable, Webi};
//!
//! let webi = Webi::new();
//! let scope = Observable::from_json(serde_json::json!({"n": 1})).unwrap();
//! let node = webi.render("<span>{{n}}</span>", &scope).unwrap();
//! scope.set("n", 2);
//! assert_eq!(node.outer_html(), "<span>2</span>");
//! ```

pub mod error;
pub mod listeners;
pub mod value;
pub mod observable;
pub mod observable_array;
pub mod path_access;
pub mod node_path;
pub mod expr;
pub mod directive;
pub mod webi;
pub mod compiler;
pub mod template;
pub mod directives;

pub use error::{WebiError, WebiErrorKind};
pub use listeners::Unwatch;
pub use value::Value;
pub use observable::{Change, Observable, WeakObservable};
pub use observable_array::ObservableArray;
pub use node_path::NodePath;
pub use expr::{Expr, Segment};
pub use directive::{AttributeHandler, AttributeView, BindContext, Handler, TagHandler};
pub use webi::{Webi, WebiBuilder, WebiOptions};
pub use compiler::Compiler;
pub use template::{Binding, Template};

pub use wdom::Node;
