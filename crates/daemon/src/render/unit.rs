use std::path::{Path, PathBuf};

use engine::{NodeKind, Timeline};

/// One compilation unit: a timeline with its own cache directory and output, owning the units of
/// the compositions nested in it.
#[derive(Debug, Clone)]
pub struct RenderUnit {
    pub id: String,
    pub timeline: Timeline,
    pub cache_dir: PathBuf,
    pub output: PathBuf,
    pub children: Vec<ChildUnit>,
}

/// A nested unit and the node whose composition it renders.
#[derive(Debug, Clone)]
pub struct ChildUnit {
    pub scene: usize,
    pub node: usize,
    pub unit: RenderUnit,
}

impl RenderUnit {
    /// Build the unit tree. Compositions are detached into children; their nodes keep an empty
    /// placeholder timeline until the child output is attached.
    pub fn build(id: impl Into<String>, mut timeline: Timeline, cache_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let cache_dir = cache_dir.into();
        let mut children = Vec::new();

        for (s, scene) in timeline.scenes.iter_mut().enumerate() {
            for (n, node) in scene.nodes.iter_mut().enumerate() {
                let NodeKind::Composition { timeline: nested, .. } = &mut node.kind else {
                    continue;
                };
                let placeholder = Timeline::new(nested.settings.clone());
                let nested = std::mem::replace(nested.as_mut(), placeholder);
                let child_id = format!("{}.{}.{}", id, s, n);
                let child_cache = cache_dir.join(format!("composition-{}-{}", s, n));
                let child_output = cache_dir.join(format!("composition-{}-{}.mp4", s, n));
                children.push(ChildUnit {
                    scene: s,
                    node: n,
                    unit: RenderUnit::build(child_id, nested, child_cache, child_output),
                });
            }
        }

        RenderUnit {
            id,
            timeline,
            cache_dir,
            output: output.into(),
            children,
        }
    }

    /// Point a composition node at its rendered file.
    pub fn attach_output(&mut self, scene: usize, node: usize, path: &Path) {
        let Some(node) = self
            .timeline
            .scenes
            .get_mut(scene)
            .and_then(|s| s.nodes.get_mut(node))
        else {
            return;
        };
        if let NodeKind::Composition { output, .. } = &mut node.kind {
            *output = Some(path.to_string_lossy().into_owned());
        }
    }

    /// Attach every child's planned output without rendering it.
    pub fn attach_planned_outputs(&mut self) {
        let planned: Vec<(usize, usize, PathBuf)> = self
            .children
            .iter()
            .map(|c| (c.scene, c.node, c.unit.output.clone()))
            .collect();
        for (scene, node, path) in planned {
            self.attach_output(scene, node, &path);
        }
    }

    /// Ids of this unit and all of its descendants.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        for child in &self.children {
            ids.extend(child.unit.ids());
        }
        ids
    }
}
