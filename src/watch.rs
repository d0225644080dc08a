// Shader hot reload
//
// Watches the shader directory and reports when compiled SPIR-V changed.
// Events arrive on notify's thread and are drained on the render thread.

use anyhow::Context;
use notify::{
    event::ModifyKind, recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, TryRecvError};

pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Event>,
}

impl ShaderWatcher {
    pub fn new(dir: &Path) -> anyhow::Result<Self> {
        let (sender, events) = channel();

        let mut watcher =
            recommended_watcher(move |event_res: Result<notify::Event, notify::Error>| {
                match event_res {
                    Ok(event) => {
                        // Receiver gone means the watcher is being torn down
                        let _ = sender.send(event);
                    }
                    Err(err) => log::error!("Shader watcher had an error: {err}"),
                }
            })
            .context("Failed to create shader watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch shader directory {:?}", dir))?;

        log::info!("Watching {:?} for shader changes", dir);

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Drain pending events; true if any compiled shader changed
    pub fn poll_changed(&self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => changed |= is_shader_event(&event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changed
    }
}

/// A content change to a `.spv` file
pub fn is_shader_event(event: &notify::Event) -> bool {
    match &event.kind {
        EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_)) => return false,
        EventKind::Create(_) | EventKind::Modify(_) => {}
        _ => return false,
    }

    event
        .paths
        .iter()
        .any(|path| path.extension().is_some_and(|ext| ext == "spv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use notify::Event;

    #[test]
    fn spirv_writes_trigger_reload() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("shaders/triangle.frag.spv".into());
        assert!(is_shader_event(&event));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path("shaders/triangle.vert.spv".into());
        assert!(is_shader_event(&event));
    }

    #[test]
    fn glsl_sources_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("shaders/triangle.frag".into());
        assert!(!is_shader_event(&event));
    }

    #[test]
    fn non_content_events_are_ignored() {
        let path = "shaders/triangle.frag.spv";
        for kind in [
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            EventKind::Remove(RemoveKind::File),
        ] {
            let event = Event::new(kind).add_path(path.into());
            assert!(!is_shader_event(&event), "{:?}", event.kind);
        }
    }
}
