//! On-disk layout of a partitioned run.
//!
//! ```text
//! <dir>/partmesh.txt        partition catalog
//! <dir>/fort.67             consolidated (global) hotstart
//! <dir>/PE0000/fort.14      rank 0 mesh table
//! <dir>/PE0000/fort.67      rank 0 hotstart
//! ...
//! ```
//! Ranks only read shared files and only write into their own `PE` directory;
//! the global hotstart is written by the root alone.

use crate::algs::consolidate::PresentNodeSource;
use crate::io::hotstart::{HotstartCodec, HotstartRecord};
use crate::io::mesh::{PresentMeshTable, read_catalog, write_catalog};
use crate::mesh_error::MeshRegridError;
use crate::topology::catalog::PartitionCatalog;
use crate::topology::ownership::OwnershipPolicy;
use crate::topology::partition::MeshPartition;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CATALOG_FILE: &str = "partmesh.txt";
const MESH_FILE: &str = "fort.14";
const HOTSTART_FILE: &str = "fort.67";
const TEXT_DUMP_SUFFIX: &str = "txt";

/// Which hotstart file to address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotstartScope {
    /// The per-rank file of the given rank.
    Rank(usize),
    /// The consolidated file at the top of the layout.
    Global,
}

/// Paths and loaders for a partitioned run directory.
#[derive(Clone, Debug)]
pub struct PartitionLayout {
    dir: PathBuf,
}

impl PartitionLayout {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    pub fn rank_dir(&self, rank: usize) -> PathBuf {
        self.dir.join(format!("PE{rank:04}"))
    }

    pub fn mesh_path(&self, rank: usize) -> PathBuf {
        self.rank_dir(rank).join(MESH_FILE)
    }

    pub fn hotstart_path(&self, scope: HotstartScope) -> PathBuf {
        match scope {
            HotstartScope::Rank(rank) => self.rank_dir(rank).join(HOTSTART_FILE),
            HotstartScope::Global => self.dir.join(HOTSTART_FILE),
        }
    }

    pub fn read_catalog(&self, global_nodes: usize) -> Result<PartitionCatalog, MeshRegridError> {
        read_catalog(File::open(self.catalog_path())?, global_nodes)
    }

    pub fn write_catalog(&self, catalog: &PartitionCatalog) -> Result<(), MeshRegridError> {
        fs::create_dir_all(&self.dir)?;
        write_catalog(catalog, BufWriter::new(File::create(self.catalog_path())?))
    }

    pub fn read_table(&self, rank: usize) -> Result<PresentMeshTable, MeshRegridError> {
        PresentMeshTable::read(BufReader::new(File::open(self.mesh_path(rank))?))
    }

    pub fn write_table(
        &self,
        rank: usize,
        table: &PresentMeshTable,
    ) -> Result<(), MeshRegridError> {
        fs::create_dir_all(self.rank_dir(rank))?;
        table.write(BufWriter::new(File::create(self.mesh_path(rank))?))
    }

    /// Read `rank`'s mesh table and build its partition.
    pub fn load_partition(
        &self,
        rank: usize,
        size: usize,
        catalog: &PartitionCatalog,
        policy: OwnershipPolicy,
    ) -> Result<MeshPartition, MeshRegridError> {
        let table = self.read_table(rank)?;
        MeshPartition::build(rank, size, catalog, &table, policy)
    }

    pub fn read_hotstart(
        &self,
        scope: HotstartScope,
        nodes: usize,
        elements: usize,
    ) -> Result<HotstartRecord, MeshRegridError> {
        let file = File::open(self.hotstart_path(scope))?;
        HotstartCodec::read(BufReader::new(file), nodes, elements)
    }

    /// Write a hotstart, plus its text dump next to it when `text_dump` is set.
    pub fn write_hotstart(
        &self,
        scope: HotstartScope,
        record: &HotstartRecord,
        text_dump: bool,
    ) -> Result<PathBuf, MeshRegridError> {
        let path = self.hotstart_path(scope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        HotstartCodec::write(record, BufWriter::new(File::create(&path)?))?;
        if text_dump {
            let dump = path.with_extension(TEXT_DUMP_SUFFIX);
            HotstartCodec::write_text(record, BufWriter::new(File::create(dump)?))?;
        }
        Ok(path)
    }
}

impl PresentNodeSource for PartitionLayout {
    fn present_node_ids(&self, rank: usize) -> Result<Vec<u32>, MeshRegridError> {
        self.read_table(rank)?.node_global_ids()
    }
}
