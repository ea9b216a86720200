//! File lifecycle exercise: create, flush, close, reopen.
//!
//! Run with: mpiexec -n 2 ./target/debug/examples/basic

use mpi::traits::Communicator;
use restartio::Handle;

fn main() -> restartio::Result<()> {
    let universe = mpi::initialize().expect("MPI initialization failed");
    let world = universe.world();

    // Inspect return codes instead of aborting on the expected failures.
    restartio::set_error_handler_off();

    let mut handle = Handle::initialize(&world)?;
    let filename = "basic_demo.h5";

    // Create with overwrite always works.
    handle.file_create(filename, true)?;

    // Flush any number of times.
    handle.file_flush()?;
    handle.file_flush()?;
    handle.file_flush()?;

    // Attributes live on the file root.
    handle.string_set("creator", "basic demo")?;
    handle.attribute_write("timestep", 42i32)?;
    handle.attribute_writev("origin", &[0.0f64, 0.5, 1.0])?;

    handle.file_close()?;
    // Double closure silently succeeds.
    handle.file_close()?;

    // Create without overwrite must refuse an existing file.
    assert!(handle.file_create(filename, false).is_err());

    // Reopen read-only and check what we stored.
    handle.file_open(filename, false)?;
    assert_eq!(handle.string_get("creator")?, "basic demo");
    assert_eq!(handle.attribute_read::<i32>("timestep")?, 42);
    assert_eq!(handle.attribute_sizev("origin")?, 3);
    let mut origin = [0.0f64; 3];
    handle.attribute_readv("origin", &mut origin)?;
    assert_eq!(origin, [0.0, 0.5, 1.0]);
    handle.file_close()?;

    // Reopen read-write.
    handle.file_open(filename, true)?;
    handle.file_close()?;

    if world.rank() == 0 {
        std::fs::remove_file(filename).expect("unable to remove demo file");
        println!("basic: ok");
    }
    handle.finalize()
}
