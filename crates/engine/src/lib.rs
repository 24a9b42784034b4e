pub mod animation;
pub mod assembly;
pub mod audio;
pub mod command;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod nodes;
pub mod scene;
pub mod subtitle;
pub mod template;
pub mod timeline;
pub mod transition;

pub use assembly::{compile, Finish, GeneratedFile, Layout, RenderPlan, Strategy};
pub use command::{render_command, Program, RenderCommand};
pub use error::{EngineError, EngineResult};
pub use template::Template;
pub use timeline::*;
