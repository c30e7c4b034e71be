//! Deterministic reordering of a descriptor tree.
//!
//! Every collection whose order is not semantic is sorted by a stable key, at
//! every nesting level, so two files that declare the same things in a
//! different order canonicalize to the same tree:
//!
//! - imports: lexicographic, with `public_dependency` / `weak_dependency`
//!   indices remapped to the new positions
//! - messages, enums, services, extensions, nested types, methods: by name
//! - fields: by number; enum values: by number
//! - extension ranges and reserved ranges: by start
//! - reserved names: lexicographic
//! - uninterpreted options: by identifier value (best effort)
//! - custom options kept beside the tree: by scope, then field number
//!
//! Oneof declarations are left in place because fields refer to them by index.
//! Source-location metadata is not touched; hashing strips it instead.
//!
//! A sort key that is absent (a message with no name, a field with no number)
//! is reported with the path of the enclosing node, never skipped.

use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumOptions, EnumValueOptions, ExtensionRangeOptions,
    FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileOptions, MessageOptions,
    MethodOptions, OneofOptions, ServiceDescriptorProto, ServiceOptions, UninterpretedOption,
};
use protopkg_schema::CustomOption;
use thiserror::Error;

/// A node was missing the field its collection is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {collection}[{index}] has no {key}")]
pub struct CanonicalizeError {
    /// Slash-separated path of the enclosing node, e.g. `a.proto/Outer/Inner`.
    pub path: String,
    /// The collection being sorted, e.g. `field`.
    pub collection: &'static str,
    pub index: usize,
    /// The missing sort key, e.g. `number`.
    pub key: &'static str,
}

/// Canonicalize a file descriptor in place.
pub fn canonicalize_file(file: &mut FileDescriptorProto) -> Result<(), CanonicalizeError> {
    let path = match file.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => {
            return Err(CanonicalizeError {
                path: String::new(),
                collection: "file",
                index: 0,
                key: "name",
            })
        }
    };

    sort_imports(file);

    let at = Site::new(&path);
    sort_required(&mut file.enum_type, &at.of("enum_type", "name"), |e| e.name.clone())?;
    sort_required(&mut file.message_type, &at.of("message_type", "name"), |m| {
        m.name.clone()
    })?;
    sort_required(&mut file.service, &at.of("service", "name"), |s| s.name.clone())?;
    sort_required(&mut file.extension, &at.of("extension", "name"), |e| e.name.clone())?;

    for e in &mut file.enum_type {
        canonicalize_enum(e, &path)?;
    }
    for m in &mut file.message_type {
        canonicalize_message(m, &path)?;
    }
    for s in &mut file.service {
        canonicalize_service(s, &path)?;
    }
    for e in &mut file.extension {
        canonicalize_field(e);
    }
    sort_options(file.options.as_mut());
    Ok(())
}

/// Sort the import list and remap the index lists that point into it.
fn sort_imports(file: &mut FileDescriptorProto) {
    let mut order: Vec<usize> = (0..file.dependency.len()).collect();
    order.sort_by(|&a, &b| file.dependency[a].cmp(&file.dependency[b]));
    if order.iter().enumerate().all(|(new, &old)| new == old) {
        file.public_dependency.sort_unstable();
        file.weak_dependency.sort_unstable();
        return;
    }

    let mut new_position = vec![0i32; order.len()];
    for (new, &old) in order.iter().enumerate() {
        new_position[old] = i32::try_from(new).unwrap_or(i32::MAX);
    }
    let remap = |indices: &mut Vec<i32>| {
        for idx in indices.iter_mut() {
            if let Some(&pos) = usize::try_from(*idx).ok().and_then(|i| new_position.get(i)) {
                *idx = pos;
            }
        }
        indices.sort_unstable();
    };
    remap(&mut file.public_dependency);
    remap(&mut file.weak_dependency);

    let mut old = std::mem::take(&mut file.dependency)
        .into_iter()
        .map(Some)
        .collect::<Vec<_>>();
    file.dependency = order.iter().filter_map(|&i| old[i].take()).collect();
}

fn canonicalize_message(msg: &mut DescriptorProto, parent: &str) -> Result<(), CanonicalizeError> {
    let path = format!("{parent}/{}", msg.name.as_deref().unwrap_or_default());
    let at = Site::new(&path);

    msg.reserved_name.sort();
    sort_required(&mut msg.enum_type, &at.of("enum_type", "name"), |e| e.name.clone())?;
    sort_required(&mut msg.field, &at.of("field", "number"), |f| f.number)?;
    sort_required(&mut msg.nested_type, &at.of("nested_type", "name"), |m| {
        m.name.clone()
    })?;
    sort_required(&mut msg.extension, &at.of("extension", "name"), |e| e.name.clone())?;
    sort_required(&mut msg.extension_range, &at.of("extension_range", "start"), |r| {
        r.start
    })?;
    sort_required(&mut msg.reserved_range, &at.of("reserved_range", "start"), |r| {
        r.start
    })?;

    for e in &mut msg.enum_type {
        canonicalize_enum(e, &path)?;
    }
    for f in &mut msg.field {
        canonicalize_field(f);
    }
    for m in &mut msg.nested_type {
        canonicalize_message(m, &path)?;
    }
    for e in &mut msg.extension {
        canonicalize_field(e);
    }
    for r in &mut msg.extension_range {
        sort_options(r.options.as_mut());
    }
    for o in &mut msg.oneof_decl {
        sort_options(o.options.as_mut());
    }
    sort_options(msg.options.as_mut());
    Ok(())
}

fn canonicalize_enum(e: &mut EnumDescriptorProto, parent: &str) -> Result<(), CanonicalizeError> {
    let path = format!("{parent}/{}", e.name.as_deref().unwrap_or_default());
    let at = Site::new(&path);

    sort_required(&mut e.value, &at.of("value", "number"), |v| v.number)?;
    sort_required(&mut e.reserved_range, &at.of("reserved_range", "start"), |r| {
        r.start
    })?;
    e.reserved_name.sort();

    for v in &mut e.value {
        sort_options(v.options.as_mut());
    }
    sort_options(e.options.as_mut());
    Ok(())
}

fn canonicalize_field(f: &mut FieldDescriptorProto) {
    sort_options(f.options.as_mut());
}

fn canonicalize_service(
    s: &mut ServiceDescriptorProto,
    parent: &str,
) -> Result<(), CanonicalizeError> {
    let path = format!("{parent}/{}", s.name.as_deref().unwrap_or_default());
    sort_required(&mut s.method, &Site::new(&path).of("method", "name"), |m| {
        m.name.clone()
    })?;
    for m in &mut s.method {
        sort_options(m.options.as_mut());
    }
    sort_options(s.options.as_mut());
    Ok(())
}

/// Where a sort happens, for error reporting.
struct Site<'a> {
    path: &'a str,
    collection: &'static str,
    key: &'static str,
}

impl<'a> Site<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            collection: "",
            key: "",
        }
    }

    fn of(&self, collection: &'static str, key: &'static str) -> Site<'a> {
        Site {
            path: self.path,
            collection,
            key,
        }
    }
}

/// Stable sort by a required key. Every key is read before anything moves,
/// so a missing key leaves the collection untouched.
fn sort_required<T, K: Ord>(
    items: &mut Vec<T>,
    site: &Site<'_>,
    key: impl Fn(&T) -> Option<K>,
) -> Result<(), CanonicalizeError> {
    let keys = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            key(item).ok_or_else(|| CanonicalizeError {
                path: site.path.to_owned(),
                collection: site.collection,
                index,
                key: site.key,
            })
        })
        .collect::<Result<Vec<K>, _>>()?;

    let mut keyed: Vec<(K, T)> = keys.into_iter().zip(items.drain(..)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
    Ok(())
}

/// Option messages that carry a list of uninterpreted options.
trait UninterpretedOptions {
    fn uninterpreted_options(&mut self) -> &mut Vec<UninterpretedOption>;
}

macro_rules! uninterpreted_options {
    ($($ty:ty),* $(,)?) => {
        $(
            impl UninterpretedOptions for $ty {
                fn uninterpreted_options(&mut self) -> &mut Vec<UninterpretedOption> {
                    &mut self.uninterpreted_option
                }
            }
        )*
    };
}

uninterpreted_options!(
    FileOptions,
    MessageOptions,
    FieldOptions,
    OneofOptions,
    EnumOptions,
    EnumValueOptions,
    ServiceOptions,
    MethodOptions,
    ExtensionRangeOptions,
);

// Options without an identifier value sort first; the name path is not compared.
fn sort_options<O: UninterpretedOptions>(options: Option<&mut O>) {
    if let Some(options) = options {
        options
            .uninterpreted_options()
            .sort_by(|a, b| a.identifier_value().cmp(b.identifier_value()));
    }
}

/// Order extension options by the declaration they are set on, then by field
/// number. Repeated values of one option keep their relative order.
pub fn canonicalize_custom_options(options: &mut [CustomOption]) {
    options.sort_by(|a, b| (a.scope.as_str(), a.field).cmp(&(b.scope.as_str(), b.field)));
}
