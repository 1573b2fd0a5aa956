//! Cross-subset accumulation and shape alignment.

use std::sync::Arc;

use itertools::Itertools;
use log::debug;
use metbuf_common::{Error, Result};
use metbuf_format::{TypeInfo, MISSING_VALUE};

use crate::data_object::{ContainerKind, DataObject};
use crate::frame::DataFrame;
use crate::target::Targets;

/// Accumulates one [`DataFrame`] per processed subset and materializes named
/// queries into dense arrays.
///
/// A query's bounding shape takes the maximum replication count at each
/// level across all frames. When counts vary within a frame or across
/// frames the shape is *jagged* and each frame's readings are inflated with
/// missing-value fill so that semantically corresponding readings share an
/// index across subsets.
///
/// The full harvest is retained until [`get`](ResultSet::get); callers
/// should process messages in bounded batches.
#[derive(Default)]
pub struct ResultSet {
    frames: Vec<DataFrame>,
}

struct RawValues {
    data: Vec<f64>,
    dims: Vec<usize>,
    dim_paths: Vec<String>,
    type_info: TypeInfo,
}

impl ResultSet {
    pub fn new() -> ResultSet {
        ResultSet::default()
    }

    /// Appends an empty frame for the given targets and hands it to the
    /// runner for filling.
    pub(crate) fn next_data_frame(&mut self, targets: Arc<Targets>) -> &mut DataFrame {
        self.frames.push(DataFrame::new(targets));
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    /// Number of accumulated frames (one per processed subset).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[DataFrame] {
        &self.frames
    }

    /// Materializes the named query across all accumulated frames.
    ///
    /// `group_by` names another query whose replication path must prefix
    /// this one's; it is validated and recorded on the output object.
    /// `override_type` forces the container type (`"int"`/`"int32"`,
    /// `"int64"`, `"float"`, `"double"`, `"string"`); string and numeric
    /// containers are not interchangeable.
    ///
    /// # Errors
    ///
    /// Fails when no frames were accumulated, the name (or group-by name) is
    /// unknown, the group-by paths are incompatible, or the override type is
    /// unknown or incompatible with the field's data.
    pub fn get(
        &self,
        field_name: &str,
        group_by: Option<&str>,
        override_type: Option<&str>,
    ) -> Result<DataObject> {
        let raw = self.raw_values(field_name, group_by)?;
        self.make_data_object(field_name, group_by, raw, override_type)
    }

    fn raw_values(&self, field_name: &str, group_by: Option<&str>) -> Result<RawValues> {
        if self.frames.is_empty() {
            return Err(Error::no_data());
        }

        let target_idx = self.frames[0]
            .targets()
            .iter()
            .position(|target| target.name == field_name)
            .ok_or_else(|| {
                Error::invalid_arg("field_name", format!("no query named \"{field_name}\""))
            })?;

        if let Some(group_name) = group_by.filter(|name| !name.is_empty()) {
            self.check_group_by_path(target_idx, group_name)?;
        }

        // Bounding shape: the maximum count per level across frames, with
        // jaggedness flagged as soon as counts disagree within or across
        // frames.
        let path_len = self
            .frames
            .iter()
            .map(|frame| frame.field_at(target_idx).target.path.len())
            .max()
            .unwrap_or(1);
        let mut dims_list = vec![0usize; path_len.saturating_sub(1).max(1)];
        let mut jagged = false;
        let mut type_info = TypeInfo::default();
        let mut dim_paths: Vec<String> = Vec::new();
        let mut export_dims: Vec<usize> = vec![0];

        for frame in &self.frames {
            let field = frame.field_at(target_idx);
            let target = &field.target;

            for position in 0..target.path.len().saturating_sub(1) {
                let Some(counts) = field.seq_counts.get(position) else {
                    break;
                };
                if counts.is_empty() {
                    break;
                }
                let level_max = counts.iter().copied().max().unwrap_or(0);
                let new_dim = dims_list[position].max(level_max);
                if !jagged {
                    jagged = !counts.iter().all_equal();
                    if !jagged && dims_list[position] != 0 {
                        jagged = dims_list[position] != new_dim;
                    }
                }
                dims_list[position] = new_dim;
            }

            type_info.merge(&target.type_info);

            if !target.dim_paths.is_empty() && dim_paths.len() < target.dim_paths.len() {
                dim_paths = target.dim_paths.clone();
                export_dims = target.export_dim_idxs.clone();
            }
        }

        // A fully absent level still gets one cell per frame for the
        // missing sentinel.
        let mut dims = dims_list;
        for dim in dims.iter_mut() {
            if *dim == 0 {
                *dim = 1;
            }
        }

        let row_length: usize = dims.iter().skip(1).product();
        let total_rows = self.frames.len();
        let mut data = vec![MISSING_VALUE; total_rows * row_length];

        if jagged {
            debug!("materializing jagged shape for field {field_name}");
        }

        for (frame_idx, frame) in self.frames.iter().enumerate() {
            let field = frame.field_at(target_idx);
            let fragment = &field.data;

            if jagged {
                scatter_jagged(&dims, field.seq_counts.as_slice(), fragment, frame_idx, row_length, &mut data);
            } else {
                for (offset, &value) in fragment.iter().enumerate() {
                    if let Some(cell) = data.get_mut(frame_idx * row_length + offset) {
                        *cell = value;
                    }
                }
            }
        }

        dims[0] = total_rows;
        let dims = export_dims
            .iter()
            .filter_map(|&index| dims.get(index).copied())
            .collect();

        Ok(RawValues {
            data,
            dims,
            dim_paths,
            type_info,
        })
    }

    /// The group-by query's replication path must be a prefix of the named
    /// query's path.
    fn check_group_by_path(&self, target_idx: usize, group_name: &str) -> Result<()> {
        let targets = self.frames[0].targets();
        let target = &targets[target_idx];
        let group_target = targets
            .iter()
            .find(|candidate| candidate.name == group_name)
            .ok_or_else(|| {
                Error::invalid_arg("group_by", format!("no query named \"{group_name}\""))
            })?;

        let target_path = target.dim_paths.last().map(String::as_str).unwrap_or("");
        let group_path = group_target
            .dim_paths
            .last()
            .map(String::as_str)
            .unwrap_or("");
        let target_components = split_path(target_path);
        let group_components = split_path(group_path);

        let shared = target_components.len().min(group_components.len());
        for position in 1..shared {
            if target_components[position] != group_components[position] {
                return Err(Error::group_by_mismatch(group_path, target_path));
            }
        }
        Ok(())
    }

    fn make_data_object(
        &self,
        field_name: &str,
        group_by: Option<&str>,
        raw: RawValues,
        override_type: Option<&str>,
    ) -> Result<DataObject> {
        let kind = match override_type.filter(|name| !name.is_empty()) {
            None => ContainerKind::for_type_info(&raw.type_info),
            Some(name) => {
                let kind = ContainerKind::parse_override(name)?;
                if kind.is_string() != raw.type_info.is_string {
                    return Err(Error::incompatible_override(field_name));
                }
                kind
            }
        };

        let mut object = DataObject::from_doubles(
            kind,
            &raw.data,
            raw.type_info.is_string,
            field_name,
            MISSING_VALUE,
        )?;
        object.set_dims(raw.dims);
        object.set_field_name(field_name);
        object.set_group_by_field_name(group_by.unwrap_or(""));
        object.set_dim_paths(raw.dim_paths);
        Ok(object)
    }
}

/// Inflates one frame's fragment into the bounding shape: per level, each
/// activation that fell short of the level's bound injects fill slots after
/// its readings, shifting every later reading outward.
fn scatter_jagged(
    dims: &[usize],
    seq_counts: &[Vec<usize>],
    fragment: &[f64],
    frame_idx: usize,
    row_length: usize,
    data: &mut [f64],
) {
    let mut idxs: Vec<usize> = (0..fragment.len()).collect();

    let mut inserts: Vec<Vec<usize>> = vec![vec![0]; dims.len()];
    for level in 0..dims.len().min(seq_counts.len()) {
        let tail: usize = dims.iter().skip(level).product();
        let tail_below: usize = dims.iter().skip(level + 1).product();
        inserts[level] = seq_counts[level]
            .iter()
            .map(|&count| tail.saturating_sub(count * tail_below))
            .collect();
    }

    for level in (0..dims.len()).rev() {
        let tail: isize = dims.iter().skip(level).product::<usize>() as isize;
        for (slot, &fill) in inserts[level].iter().enumerate() {
            if fill > 0 {
                let boundary = tail * slot as isize + tail - fill as isize - 1;
                for index in idxs.iter_mut() {
                    if *index as isize > boundary {
                        *index += fill;
                    }
                }
            }
        }
    }

    for (offset, &value) in fragment.iter().enumerate() {
        if let Some(cell) = data.get_mut(idxs[offset] + frame_idx * row_length) {
            *cell = value;
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|component| !component.is_empty())
        .collect()
}
