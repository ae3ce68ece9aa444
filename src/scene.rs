use tracing::{debug, warn};

/// Hard cap on scenes for short-form output.
pub const MAX_SCENES: usize = 10;

pub const MIN_SCENE_SECS: u32 = 3;
pub const MAX_SCENE_SECS: u32 = 6;

/// Splits a story on periods and packs consecutive sentences into scenes of at
/// most `max_chars` characters. A sentence longer than the budget becomes its
/// own scene. At most [`MAX_SCENES`] scenes are returned.
pub fn split_story_into_scenes(story: &str, max_chars: usize) -> Vec<String> {
    let normalized = story.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentences: Vec<&str> = normalized
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut scenes = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for s in sentences {
        let len = s.chars().count();
        if current.is_empty() {
            current.push_str(s);
            current_len = len;
        } else if current_len + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(s);
            current_len += 1 + len;
        } else {
            scenes.push(std::mem::take(&mut current));
            current.push_str(s);
            current_len = len;
        }
    }
    if !current.is_empty() {
        scenes.push(current);
    }

    if scenes.len() > MAX_SCENES {
        warn!("Story produced {} scenes; keeping the first {}", scenes.len(), MAX_SCENES);
        scenes.truncate(MAX_SCENES);
    }
    debug!("Split story into {} scenes", scenes.len());
    scenes
}

/// Seconds each scene is held: `clamp(floor(target / count), 3, 6)`.
///
/// The rendered total is `count * per_scene`, which is not the requested target
/// when the quotient falls outside the clamp.
pub fn per_scene_duration(target_secs: u32, scene_count: usize) -> u32 {
    let count = u32::try_from(scene_count.max(1)).unwrap_or(u32::MAX);
    (target_secs / count).clamp(MIN_SCENE_SECS, MAX_SCENE_SECS)
}
