//! Grouping raw inputs into Live Photo pairs.
//!
//! Apple's Live Photos arrive as two files sharing a base name
//! (`IMG_0001.HEIC` plus `IMG_0001.MOV`), and the whole point of this crate
//! is to keep those two together as one unit. Grouping is purely name-driven:
//!
//! 1. The group key is everything before the *last* dot (the whole name if
//!    there is no dot), so `photo.JPG.heic` groups under `photo.JPG`.
//! 2. Extensions classify files case-insensitively: images are
//!    heic/heif/jpg/jpeg/png/webp, videos are mov/mp4. Anything else is
//!    ignored without error.
//! 3. Each group holds at most one image and one video. Same-slot collisions
//!    are resolved by the configured [`DuplicatePolicy`].
//!
//! Groups come out in first-seen order. Filling the *other* slot of an
//! existing group is pairing, not a collision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PairingError {
    #[error("duplicate input name: {name}")]
    DuplicateInput { name: String },
}

/// Image extensions that produce a convertible unit.
pub const IMAGE_EXTENSIONS: &[&str] = &["heic", "heif", "jpg", "jpeg", "png", "webp"];
/// Video extensions recognized as Live Photo companions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4"];

/// A raw input: an opaque name plus its bytes.
///
/// Names may contain `/` separators (the CLI uses paths relative to a walked
/// directory); grouping only ever looks at the text before the last dot.
#[derive(Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// Which slot of a group a file occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
}

/// How to handle a second file landing on an already-occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Last write wins: the newer file silently replaces the older one.
    Replace,
    /// Fail the whole batch on the first collision.
    Reject,
    /// Reroute the newcomer to the first free derived key (`name~1`, `name~2`, …)
    /// so no input is dropped.
    #[default]
    Suffix,
}

/// One group of inputs destined to become a single unit.
///
/// At least one slot is filled by construction.
#[derive(Debug, Clone)]
pub struct PairedInput {
    pub key: String,
    pub image: Option<InputFile>,
    pub video: Option<InputFile>,
}

/// The extension after the last dot, or `""` when there is none.
fn extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// Classify a file by extension, case-insensitively.
///
/// Returns `None` for anything that is neither a recognized image nor a
/// recognized video; those files never become units.
pub fn classify(name: &str) -> Option<MediaClass> {
    let ext = extension(name).to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaClass::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaClass::Video)
    } else {
        None
    }
}

/// The base name files are grouped under: everything before the last dot,
/// or the whole name when there is no dot.
pub fn group_key(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Whether this name takes the decode path (`.heic`/`.heif`).
pub fn is_heic(name: &str) -> bool {
    let ext = extension(name).to_ascii_lowercase();
    ext == "heic" || ext == "heif"
}

/// The output name for a decoded image: a case-insensitive `.heic`/`.heif`
/// suffix becomes `.jpg`; any other name is returned unchanged.
pub fn jpeg_result_name(name: &str) -> String {
    for suffix in [".heic", ".heif"] {
        if name.len() >= suffix.len() {
            let (stem, tail) = name.split_at(name.len() - suffix.len());
            if tail.eq_ignore_ascii_case(suffix) {
                return format!("{stem}.jpg");
            }
        }
    }
    name.to_string()
}

/// Group inputs into prospective units, in first-seen order.
///
/// Unrecognized extensions are skipped silently; same-slot collisions follow
/// `policy`. Only `DuplicatePolicy::Reject` can fail.
pub fn pair_inputs(
    inputs: Vec<InputFile>,
    policy: DuplicatePolicy,
) -> Result<Vec<PairedInput>, PairingError> {
    let mut groups: Vec<PairedInput> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for file in inputs {
        let Some(class) = classify(&file.name) else {
            tracing::debug!("ignoring {}: unrecognized extension", file.name);
            continue;
        };
        let key = group_key(&file.name).to_string();
        place(&mut groups, &mut index, key, file, class, policy)?;
    }

    Ok(groups)
}

fn place(
    groups: &mut Vec<PairedInput>,
    index: &mut HashMap<String, usize>,
    key: String,
    file: InputFile,
    class: MediaClass,
    policy: DuplicatePolicy,
) -> Result<(), PairingError> {
    let Some(&at) = index.get(&key) else {
        index.insert(key.clone(), groups.len());
        groups.push(new_group(key, file, class));
        return Ok(());
    };

    let slot = match class {
        MediaClass::Image => &mut groups[at].image,
        MediaClass::Video => &mut groups[at].video,
    };
    if slot.is_none() {
        // The other half of a pair, not a duplicate.
        *slot = Some(file);
        return Ok(());
    }

    match policy {
        DuplicatePolicy::Replace => {
            tracing::debug!("replacing earlier {} for key {key}", file.name);
            *slot = Some(file);
            Ok(())
        }
        DuplicatePolicy::Reject => Err(PairingError::DuplicateInput { name: file.name }),
        DuplicatePolicy::Suffix => {
            // Probe name~1, name~2, ... until a group with this slot free
            // turns up. Duplicate halves of a pair thereby re-pair with each
            // other under the same derived key.
            let mut n = 1usize;
            loop {
                let derived = format!("{key}~{n}");
                match index.get(&derived) {
                    None => {
                        index.insert(derived.clone(), groups.len());
                        groups.push(new_group(derived, file, class));
                        return Ok(());
                    }
                    Some(&at) => {
                        let slot = match class {
                            MediaClass::Image => &mut groups[at].image,
                            MediaClass::Video => &mut groups[at].video,
                        };
                        if slot.is_none() {
                            *slot = Some(file);
                            return Ok(());
                        }
                        n += 1;
                    }
                }
            }
        }
    }
}

fn new_group(key: String, file: InputFile, class: MediaClass) -> PairedInput {
    let (image, video) = match class {
        MediaClass::Image => (Some(file), None),
        MediaClass::Video => (None, Some(file)),
    };
    PairedInput { key, image, video }
}
