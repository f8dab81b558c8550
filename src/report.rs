use crate::cluster::Cluster;
use crate::store::MergeStep;
use std::io::{self, Write};

/// Writes one `cluster <i>: <ids>` line per cluster, in the order given.
///
/// # Example
///
/// ```
/// use flow_clustering::{report, Cluster, FlowRecord};
///
/// let cluster = Cluster::new(vec![
///     FlowRecord::new(12, 0, 0, 0.0, 0.0),
///     FlowRecord::new(3, 0, 0, 0.0, 0.0),
/// ])
/// .unwrap();
/// let mut out = Vec::new();
/// report::write_clusters(&mut out, [&cluster]).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "cluster 0: 3 12\n");
/// ```
pub fn write_clusters<'a, W, I>(out: &mut W, clusters: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Cluster>,
{
    for (index, cluster) in clusters.into_iter().enumerate() {
        write!(out, "cluster {index}:")?;
        for id in cluster.flow_ids() {
            write!(out, " {id}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the merge history, one line per merge.
pub fn write_merge_history<W: Write>(out: &mut W, merges: &[MergeStep]) -> io::Result<()> {
    for (index, step) in merges.iter().enumerate() {
        writeln!(
            out,
            "merge {index}: {} + {} -> {} (distance {:.6}, size {})",
            step.left, step.right, step.merged, step.distance, step.size
        )?;
    }
    Ok(())
}
