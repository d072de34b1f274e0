//! Streaming k-way merge of sorted partitions, summing counts of equal keys.

use std::time::Instant;

use tracing::debug;

use crate::entry::{render_line, KeyCount, PartitionId};
use crate::error::{join_release, Error, Result};
use crate::heap::MinHeap;
use crate::stats::MergeStats;
use crate::storage::{PartitionReader, PartitionWriter, Storage};

/// Head entry of one input partition, waiting in the frontier. `line` is
/// where it was read from in its source.
#[derive(Debug)]
struct Head {
    key: Vec<u8>,
    count: u64,
    source: usize,
    line: u64,
}

/// Merges `inputs` into a new partition named `output`.
///
/// Every input must be ascending by key with no duplicates; the output then
/// is too, and each key's count is the sum of its counts across inputs. A
/// single input is copied through. All handles are released on every path
/// and release failures are joined onto the result.
pub fn merge_partitions<S: Storage>(storage: &S, inputs: &[PartitionId], output: &PartitionId) -> Result<MergeStats> {
    if inputs.is_empty() {
        return Err(Error::EmptyInput);
    }
    let start = Instant::now();

    let mut readers = Vec::with_capacity(inputs.len());
    for id in inputs {
        match storage.open_for_read(id.as_str()) {
            Ok(r) => readers.push(r),
            Err(e) => return join_release(Err(e), readers.into_iter().map(PartitionReader::close)),
        }
    }
    let mut writer = match storage.create_for_write(output.as_str()) {
        Ok(w) => w,
        Err(e) => return join_release(Err(e), readers.into_iter().map(PartitionReader::close)),
    };

    let mut stats = MergeStats { inputs: inputs.len() as u64, ..Default::default() };
    let merged = merge_streams(&mut readers, &mut writer, &mut stats);
    let releases = std::iter::once(writer.close()).chain(readers.into_iter().map(PartitionReader::close));
    join_release(merged, releases.collect::<Vec<_>>())?;

    stats.wall_ms = start.elapsed().as_millis() as u64;
    debug!(
        output = %output,
        inputs = stats.inputs,
        entries_in = stats.entries_in,
        entries_out = stats.entries_out,
        wall_ms = stats.wall_ms,
        "merged partitions"
    );
    Ok(stats)
}

fn merge_streams<R: PartitionReader, W: PartitionWriter>(
    readers: &mut [R],
    writer: &mut W,
    stats: &mut MergeStats,
) -> Result<()> {
    let mut frontier = MinHeap::with_capacity(readers.len(), |a: &Head, b: &Head| a.key.cmp(&b.key));
    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(KeyCount { key, count }) = reader.next_entry()? {
            frontier.push(Head { key, count, source, line: reader.line_no() });
        }
    }

    let mut line = Vec::new();
    let mut emit = |entry: &KeyCount, stats: &mut MergeStats| {
        render_line(&mut line, &entry.key, entry.count);
        stats.entries_out += 1;
        writer.write_line(&line)
    };

    let mut current: Option<KeyCount> = None;
    while let Some(head) = frontier.pop() {
        stats.entries_in += 1;
        let reader = &mut readers[head.source];
        if let Some(next) = reader.next_entry()? {
            if next.key <= head.key {
                return Err(Error::format(reader.name(), reader.line_no(), "keys are not strictly ascending"));
            }
            let line = reader.line_no();
            frontier.push(Head { key: next.key, count: next.count, source: head.source, line });
        }

        current = match current.take() {
            Some(mut cur) if cur.key == head.key => {
                cur.count = cur.count.checked_add(head.count).ok_or_else(|| {
                    Error::format(readers[head.source].name(), head.line, "count overflows u64")
                })?;
                Some(cur)
            }
            prev => {
                if let Some(prev) = prev {
                    emit(&prev, &mut *stats)?;
                }
                Some(KeyCount { key: head.key, count: head.count })
            }
        };
    }
    if let Some(last) = current {
        emit(&last, &mut *stats)?;
    }
    Ok(())
}
