//! Parquet I/O for partition persistence
//!
//! Based on `DuckDB` (Raasveldt et al., SIGMOD 2019) columnar storage patterns.
//!
//! # Format
//!
//! A partition is stored as two Parquet files:
//! - `{path}_edges.parquet`: (`source_local`, `dest_partition`, `dest_local`, weight)
//! - `{path}_vertices.parquet`: (`local_id`, `global_id`)
//!
//! The partition id is kept in the key-value metadata of both files.

use crate::partition::{Edge, Partition};
use crate::{EngineError, PartitionId};
use anyhow::{Context, Result};
use arrow::array::{Array, Float32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const PARTITION_KEY: &str = "trueno_frontier.partition";

impl Partition {
    /// Write the partition to Parquet files
    ///
    /// Creates two files:
    /// - `{path}_edges.parquet`: one row per edge, grouped by source
    /// - `{path}_vertices.parquet`: local to global id mapping
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let base_path = path.as_ref();

        self.write_edges_parquet(base_path)?;
        self.write_vertices_parquet(base_path)?;

        Ok(())
    }

    /// Read a partition written by [`write_parquet`](Self::write_parquet)
    ///
    /// The topology is validated and cached on the device.
    ///
    /// # Errors
    ///
    /// Returns error if files don't exist, Arrow conversion fails, or the
    /// stored topology is invalid
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref();

        let (id, global_ids) = read_vertices_parquet(base_path)?;
        let (edge_id, rows) = read_edges_parquet(base_path)?;
        if edge_id != id {
            return Err(EngineError::InvalidTopology(format!(
                "edge file belongs to partition {edge_id}, vertex file to {id}"
            ))
            .into());
        }

        // Rebuild offsets from the source column
        let vertex_count = global_ids.len();
        let mut offsets = vec![0_u32; vertex_count + 1];
        let mut edges = Vec::with_capacity(rows.len());
        let mut weights = Vec::with_capacity(rows.len());
        let mut previous = 0;
        for (source, edge, weight) in rows {
            if source as usize >= vertex_count || source < previous {
                return Err(EngineError::InvalidTopology(format!(
                    "edge rows not grouped by source at vertex {source}"
                ))
                .into());
            }
            previous = source;
            offsets[source as usize + 1] += 1;
            edges.push(edge);
            weights.push(weight);
        }
        for v in 0..vertex_count {
            offsets[v + 1] += offsets[v];
        }

        Self::new(id, offsets, edges, weights, global_ids)
    }

    #[allow(clippy::cast_possible_truncation)] // Partition ids and degrees fit in u32
    fn write_edges_parquet(&self, base_path: &Path) -> Result<()> {
        let edges_path = format!("{}_edges.parquet", base_path.display());

        let mut sources = Vec::with_capacity(self.edge_count());
        for v in 0..self.vertex_count() {
            sources.extend(std::iter::repeat(v as u32).take(self.out_degree(v)));
        }
        let edges = self.edges().host();
        let partitions: Vec<u32> = edges.iter().map(|edge| edge.partition).collect();
        let locals: Vec<u32> = edges.iter().map(|edge| edge.local).collect();
        let weights = self.weights().host().to_vec();

        let schema = Arc::new(Schema::new(vec![
            Field::new("source_local", DataType::UInt32, false),
            Field::new("dest_partition", DataType::UInt32, false),
            Field::new("dest_local", DataType::UInt32, false),
            Field::new("weight", DataType::Float32, false),
        ]));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(UInt32Array::from(sources)),
                Arc::new(UInt32Array::from(partitions)),
                Arc::new(UInt32Array::from(locals)),
                Arc::new(Float32Array::from(weights)),
            ],
        )
        .context("Failed to create edges RecordBatch")?;

        write_batch(&edges_path, schema, &batch, self.id())
    }

    fn write_vertices_parquet(&self, base_path: &Path) -> Result<()> {
        let vertices_path = format!("{}_vertices.parquet", base_path.display());

        #[allow(clippy::cast_possible_truncation)] // Partitions >4B vertices not supported
        let local_ids: Vec<u32> = (0..self.vertex_count()).map(|v| v as u32).collect();

        let schema = Arc::new(Schema::new(vec![
            Field::new("local_id", DataType::UInt32, false),
            Field::new("global_id", DataType::UInt32, false),
        ]));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(UInt32Array::from(local_ids)),
                Arc::new(UInt32Array::from(self.global_ids().to_vec())),
            ],
        )
        .context("Failed to create vertices RecordBatch")?;

        write_batch(&vertices_path, schema, &batch, self.id())
    }
}

fn write_batch(path: &str, schema: Arc<Schema>, batch: &RecordBatch, id: PartitionId) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {path}"))?;

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3)?,
        ))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            PARTITION_KEY.to_string(),
            id.to_string(),
        )]))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(())
}

fn open_reader(
    path: &str,
) -> Result<(PartitionId, parquet::arrow::arrow_reader::ParquetRecordBatchReader)> {
    let file = File::open(path).with_context(|| format!("Failed to open {path}"))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let id = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|entries| entries.iter().find(|kv| kv.key == PARTITION_KEY))
        .and_then(|kv| kv.value.as_deref())
        .with_context(|| format!("{path} has no partition id"))?
        .parse()
        .with_context(|| format!("{path} has a malformed partition id"))?;

    Ok((id, builder.build()?))
}

fn typed_column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing {name} column"))?
        .as_any()
        .downcast_ref::<A>()
        .with_context(|| format!("Invalid {name} column type"))
}

fn read_edges_parquet(base_path: &Path) -> Result<(PartitionId, Vec<(u32, Edge, f32)>)> {
    let edges_path = format!("{}_edges.parquet", base_path.display());
    let (id, reader) = open_reader(&edges_path)?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch: RecordBatch = batch_result?;

        let sources = typed_column::<UInt32Array>(&batch, "source_local")?;
        let partitions = typed_column::<UInt32Array>(&batch, "dest_partition")?;
        let locals = typed_column::<UInt32Array>(&batch, "dest_local")?;
        let weights = typed_column::<Float32Array>(&batch, "weight")?;

        for i in 0..batch.num_rows() {
            rows.push((
                sources.value(i),
                Edge {
                    partition: partitions.value(i),
                    local: locals.value(i),
                },
                weights.value(i),
            ));
        }
    }

    Ok((id, rows))
}

fn read_vertices_parquet(base_path: &Path) -> Result<(PartitionId, Vec<u32>)> {
    let vertices_path = format!("{}_vertices.parquet", base_path.display());
    let (id, reader) = open_reader(&vertices_path)?;

    let mut global_ids = Vec::new();
    for batch_result in reader {
        let batch: RecordBatch = batch_result?;

        let local_ids = typed_column::<UInt32Array>(&batch, "local_id")?;
        let globals = typed_column::<UInt32Array>(&batch, "global_id")?;
        for i in 0..batch.num_rows() {
            if local_ids.value(i) as usize != global_ids.len() {
                return Err(EngineError::InvalidTopology(format!(
                    "vertex rows out of order at local id {}",
                    local_ids.value(i)
                ))
                .into());
            }
            global_ids.push(globals.value(i));
        }
    }

    Ok((id, global_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_by_range;
    use crate::storage::CsrGraph;
    use crate::NodeId;
    use tempfile::tempdir;

    fn graph() -> CsrGraph {
        CsrGraph::with_vertex_count(
            6,
            &[
                (NodeId(0), NodeId(1), 1.0),
                (NodeId(0), NodeId(4), 2.0),
                (NodeId(2), NodeId(3), 3.0),
                (NodeId(4), NodeId(5), 4.0),
                (NodeId(5), NodeId(0), 5.0),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_parquet_roundtrip() {
        let dir = tempdir().unwrap();
        let (_, shards) = partition_by_range(&graph(), 2).unwrap();

        for shard in &shards {
            let path = dir.path().join(format!("part_{}", shard.id()));
            shard.write_parquet(&path).await.unwrap();

            let loaded = Partition::read_parquet(&path).await.unwrap();
            assert_eq!(loaded.id(), shard.id());
            assert_eq!(loaded.global_ids(), shard.global_ids());
            assert_eq!(loaded.offsets().host(), shard.offsets().host());
            assert_eq!(loaded.edges().host(), shard.edges().host());
            assert_eq!(loaded.weights().host(), shard.weights().host());
            // Cached on the device after loading
            assert_eq!(loaded.edge_range(0), shard.edge_range(0));
        }
    }

    #[tokio::test]
    async fn test_empty_partition_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");

        let partition = Partition::from_csr(&CsrGraph::new()).unwrap();
        partition.write_parquet(&path).await.unwrap();

        let loaded = Partition::read_parquet(&path).await.unwrap();
        assert_eq!(loaded.vertex_count(), 0);
        assert_eq!(loaded.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_column_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated");
        let partition = Partition::from_csr(&graph()).unwrap();
        partition.write_parquet(&path).await.unwrap();

        // Overwrite the vertex file with the global_id column dropped
        let schema = Arc::new(Schema::new(vec![Field::new(
            "local_id",
            DataType::UInt32,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(UInt32Array::from(vec![0, 1, 2, 3, 4, 5]))],
        )
        .unwrap();
        let vertices_path = format!("{}_vertices.parquet", path.display());
        write_batch(&vertices_path, schema, &batch, 0).unwrap();

        let err = Partition::read_parquet(&path).await.unwrap_err();
        assert!(err.to_string().contains("Missing global_id column"), "{err}");
    }

    #[tokio::test]
    async fn test_missing_files() {
        let dir = tempdir().unwrap();
        assert!(Partition::read_parquet(dir.path().join("absent"))
            .await
            .is_err());
    }
}
