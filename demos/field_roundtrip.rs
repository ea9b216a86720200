//! Distributed field round-trip across the fastest direction.
//!
//! Run with: mpiexec -n 2 ./target/debug/examples/field_roundtrip

use mpi::traits::Communicator;
use restartio::{Decomposition, Handle};

fn main() -> restartio::Result<()> {
    let universe = mpi::initialize().expect("MPI initialization failed");
    let world = universe.world();
    let rank = world.rank() as usize;
    let size = world.size() as usize;

    restartio::set_error_handler_off();

    let mut handle = Handle::initialize(&world)?;
    let filename = "field_roundtrip.h5";

    // Each rank holds an equal span of A; B and C are not distributed.
    let alocal = 4;
    let aglobal = alocal * size;
    let c = Decomposition::new(1, 0, 1);
    let b = Decomposition::new(1, 0, 1);
    let a = Decomposition::new(aglobal, rank * alocal, alocal);

    let written: Vec<f64> = (0..alocal).map(|i| (rank * alocal + i) as f64).collect();

    handle.file_create(filename, true)?;
    handle.field_write("u", &written, c, b, a)?;

    // A second identical write is permitted and leaves metadata alone.
    handle.field_write("u", &written, c, b, a)?;

    // Any extent mismatch with the stored field is rejected.
    let wrong_a = Decomposition::new(aglobal + 1, rank * alocal, alocal);
    assert!(handle.field_write("u", &written, c, b, wrong_a).is_err());

    handle.file_close()?;

    // Reopen and read back under the same decomposition.
    handle.file_open(filename, false)?;
    assert_eq!(handle.field_size("u")?, (1, 1, aglobal));

    let mut read = vec![0.0f64; alocal];
    handle.field_read("u", &mut read, c, b, a)?;
    assert_eq!(read, written);

    // Rank 0 additionally reads the entire array to check every slab
    // landed where its writer intended; the other ranks participate in
    // the collective by re-reading their own slab.
    let whole = Decomposition::new(aglobal, 0, aglobal);
    let mut global = vec![0.0f64; aglobal];
    if rank == 0 {
        handle.field_read("u", &mut global, c, b, whole)?;
        for (i, value) in global.iter().enumerate() {
            assert_eq!(*value, i as f64);
        }
    } else {
        handle.field_read("u", &mut global[..alocal], c, b, a)?;
    }

    handle.file_close()?;

    if rank == 0 {
        std::fs::remove_file(filename).expect("unable to remove demo file");
        println!("field_roundtrip: ok ({size} ranks)");
    }
    handle.finalize()
}
