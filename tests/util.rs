#![allow(dead_code)]
use mesh_regrid::algs::communicator::ThreadComm;
use mesh_regrid::io::mesh::{ElementRecord, NodeRecord, PresentMeshTable};
use mesh_regrid::topology::catalog::PartitionCatalog;
use mesh_regrid::topology::ownership::OwnershipPolicy;
use mesh_regrid::topology::partition::MeshPartition;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A global triangle mesh: coordinates by global id - 1, triangles by global id.
#[derive(Clone, Debug)]
pub struct GlobalMesh {
    pub coords: Vec<[f64; 2]>,
    pub triangles: Vec<[u32; 3]>,
}

impl GlobalMesh {
    pub fn node_count(&self) -> usize {
        self.coords.len()
    }
}

/// Structured `nx` × `ny` node grid split into two triangles per cell.
pub fn grid(nx: usize, ny: usize, origin: [f64; 2], spacing: f64) -> GlobalMesh {
    let mut coords = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            coords.push([
                origin[0] + i as f64 * spacing,
                origin[1] + j as f64 * spacing,
            ]);
        }
    }
    let id = |i: usize, j: usize| (j * nx + i + 1) as u32;
    let mut triangles = Vec::new();
    for j in 0..ny - 1 {
        for i in 0..nx - 1 {
            triangles.push([id(i, j), id(i + 1, j), id(i + 1, j + 1)]);
            triangles.push([id(i, j), id(i + 1, j + 1), id(i, j + 1)]);
        }
    }
    GlobalMesh { coords, triangles }
}

/// Per-rank mesh tables with one layer of halo.
///
/// A rank sees every triangle touching one of its nodes, plus all its owned
/// nodes. Present nodes are listed by *descending* global id so the owned
/// scan order differs from global order.
pub fn partition_tables(mesh: &GlobalMesh, owners: &[u32], size: usize) -> Vec<PresentMeshTable> {
    (0..size)
        .map(|rank| {
            let owned = |gid: u32| owners[(gid - 1) as usize] as usize == rank;
            let tris: Vec<(usize, [u32; 3])> = mesh
                .triangles
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, tri)| tri.iter().any(|&g| owned(g)))
                .collect();
            let mut present: BTreeSet<u32> =
                (1..=mesh.node_count() as u32).filter(|&g| owned(g)).collect();
            for (_, tri) in &tris {
                present.extend(tri.iter().copied());
            }
            let order: Vec<u32> = present.into_iter().rev().collect();
            let position = |gid: u32| order.iter().position(|&g| g == gid).unwrap() as u32 + 1;
            PresentMeshTable {
                title: format!("rank {rank}"),
                nodes: order
                    .iter()
                    .map(|&gid| {
                        let [x, y] = mesh.coords[(gid - 1) as usize];
                        NodeRecord {
                            signed_id: if owned(gid) { gid as i64 } else { -(gid as i64) },
                            x,
                            y,
                            depth: 1.0 + x + 2.0 * y,
                        }
                    })
                    .collect(),
                elements: tris
                    .iter()
                    .map(|(e, tri)| {
                        let signed = *e as i64 + 1;
                        ElementRecord {
                            signed_id: if tri.iter().all(|&g| owned(g)) { signed } else { -signed },
                            corners: tri.map(position),
                        }
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Build every rank's partition.
pub fn build_all(
    catalog: &PartitionCatalog,
    tables: &[PresentMeshTable],
) -> Vec<MeshPartition> {
    tables
        .iter()
        .enumerate()
        .map(|(rank, t)| {
            MeshPartition::build(rank, tables.len(), catalog, t, OwnershipPolicy::Strict).unwrap()
        })
        .collect()
}

pub fn present_ids(tables: &[PresentMeshTable]) -> Vec<Vec<u32>> {
    tables
        .iter()
        .map(|t| t.node_global_ids().unwrap())
        .collect()
}

/// Run `f` once per rank of a fresh in-process world, one thread each.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = ThreadComm::world(size)
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mesh-regrid-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
