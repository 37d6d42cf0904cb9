//! Graphviz snapshots of the machine after each transition.
//!
//! Each (event, state) pair is drawn once to
//! `<dir>/images/state_images/state_<event>_<state>.dot`, and
//! `<dir>/images/state.dot` is relinked to the latest one.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::state_machine::{DiagramRenderer, TransitionTable};

/// Environment variable naming the image root.
pub const IMAGE_ROOT_ENV: &str = "PANDIR";

pub struct DotDiagram {
    root: PathBuf,
}

impl DotDiagram {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Snapshot file for an (event, state) pair. Names are reduced to
    /// `[A-Za-z0-9_-]` so they can never leave `state_images/`.
    pub fn image_path(&self, event: &str, state: &str) -> PathBuf {
        self.root.join("images").join("state_images").join(format!(
            "state_{}_{}.dot",
            file_safe(event),
            file_safe(state)
        ))
    }

    pub fn link_path(&self) -> PathBuf {
        self.root.join("images").join("state.dot")
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// DOT source with `state` filled and the edges `event` takes into it in bold.
pub fn to_dot(table: &TransitionTable, event: &str, state: &str) -> String {
    let nodes: BTreeSet<&str> = table.iter().flat_map(|t| [t.source(), t.dest()]).collect();

    let mut dot = String::from("digraph state_machine {\n    rankdir=LR;\n");
    for node in nodes {
        if node == state {
            let _ = writeln!(dot, "    \"{node}\" [style=filled, fillcolor=lightblue];");
        } else {
            let _ = writeln!(dot, "    \"{node}\";");
        }
    }
    for t in table.iter() {
        let style = if t.trigger() == event && t.dest() == state {
            ", style=bold, color=blue"
        } else {
            ""
        };
        let _ = writeln!(
            dot,
            "    \"{}\" -> \"{}\" [label=\"{}\"{style}];",
            t.source(),
            t.dest(),
            t.trigger()
        );
    }
    dot.push_str("}\n");
    dot
}

impl DiagramRenderer for DotDiagram {
    fn render(&self, table: &TransitionTable, event: &str, state: &str) -> Result<()> {
        let image = self.image_path(event, state);
        if !image.exists() {
            if let Some(dir) = image.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            std::fs::write(&image, to_dot(table, event, state))
                .with_context(|| format!("failed to write {}", image.display()))?;
            debug!(path = %image.display(), "Wrote state diagram");
        }

        let link = self.link_path();
        if link.symlink_metadata().is_ok() {
            std::fs::remove_file(&link)?;
        }
        relink(&image, &link).with_context(|| format!("failed to link {}", link.display()))
    }
}

#[cfg(unix)]
fn relink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn relink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(target, link).map(|_| ())
}
