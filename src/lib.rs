//! toolchat: multi-turn tool-calling conversations with LLM backends.
//!
//! A [`ChatSession`](session::ChatSession) runs one conversation as a tokio
//! task. Each `send` drives the model through as many tool rounds as it asks
//! for, with retries on transient backend failures, deduplicated and
//! time-limited tool execution, and compaction when the transcript outgrows
//! its budget.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolchat::prelude::*;
//!
//! # async fn example() -> toolchat::error::Result<()> {
//! let pwd = FnTool::new(
//!     "pwd",
//!     "Print the working directory",
//!     ToolParameters::empty(),
//!     |_args, _ctx| async { Ok(serde_json::json!({"path": "/tmp"})) },
//! );
//! let registry = Arc::new(ToolRegistry::new().with_tool(pwd)?);
//!
//! let config = ChatConfig::from_env()?;
//! let mut session = ChatSession::from_config(&config, registry)?;
//! let answer = session.ask("Where am I?").await?;
//! println!("{answer}");
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod generation;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;
