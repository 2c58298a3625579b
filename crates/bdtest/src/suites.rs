//! Built-in suites
//!
//! A handful of suites that exercise the runner against a RAM block device
//! living in the context's disk image. Real suites come from a code
//! generator and link against the filesystem under test.

use bdtest_lib::defines::{Define, BLOCK_SIZE, PROG_SIZE};
use bdtest_lib::{bd_trace, prng, test_assert};
use bdtest_lib::{TestCase, TestContext, TestError, TestSuite};

/// Seed of the per-block fill pattern of the fill cases.
const PATTERN_SEED: u32 = 0x5eed;

pub fn all() -> Vec<TestSuite> {
    vec![geometry_suite(), bd_suite()]
}

fn geometry_suite() -> TestSuite {
    TestSuite::builder("test_geometry", "suites/test_geometry.toml")
        .case(
            TestCase::builder("test_geometry_layout")
                .path("suites/test_geometry.toml:1")
                .run(|ctx| {
                    let cfg = ctx.cfg().clone();
                    test_assert!(cfg.block_size % cfg.read_size == 0);
                    test_assert!(cfg.block_size % cfg.prog_size == 0);
                    test_assert!(
                        cfg.size() == 1024 * 1024,
                        "device is {} bytes, expected 1 MiB",
                        cfg.size()
                    );
                    Ok(())
                }),
        )
        .case(
            TestCase::builder("test_geometry_cache")
                .path("suites/test_geometry.toml:12")
                .define(
                    "CACHE_SIZE",
                    vec![
                        Define::derived(|reg| reg.resolve(PROG_SIZE)),
                        Define::derived(|reg| reg.resolve(BLOCK_SIZE)),
                    ],
                )
                .run(|ctx| {
                    let cfg = ctx.cfg().clone();
                    test_assert!(cfg.cache_size % cfg.prog_size == 0);
                    test_assert!(cfg.cache_size <= cfg.block_size);
                    Ok(())
                }),
        )
        .build()
}

fn bd_suite() -> TestSuite {
    TestSuite::builder("test_bd", "suites/test_bd.toml")
        .case(
            TestCase::builder("test_bd_prog_read")
                .path("suites/test_bd.toml:1")
                .define_values("N", [1, 4, 16])
                .filter(|reg| Ok(reg.resolve_named("N")? <= reg.resolve_named("BLOCK_COUNT")?))
                .run(|ctx| {
                    let n = ctx.define_named("N")? as usize;
                    bd_mount(ctx);

                    let block_size = ctx.cfg().block_size as usize;
                    let mut data = vec![0u8; block_size];
                    let mut written = Vec::with_capacity(n);
                    for block in 0..n {
                        ctx.fill_random(&mut data);
                        bd_erase(ctx, block)?;
                        bd_prog(ctx, block, &data)?;
                        written.push(data.clone());
                    }

                    let mut buf = vec![0u8; block_size];
                    for (block, expected) in written.iter().enumerate() {
                        bd_read(ctx, block, &mut buf);
                        test_assert!(&buf == expected, "block {} reads back wrong", block);
                    }
                    Ok(())
                }),
        )
        .case(
            TestCase::builder("test_bd_fill_reentrant")
                .path("suites/test_bd.toml:24")
                .define_values("BLOCKS", [4, 8])
                .reentrant()
                .run(|ctx| {
                    let blocks = ctx.define_named("BLOCKS")? as usize;
                    bd_mount(ctx);

                    // blocks written before the last power loss must still
                    // hold their pattern
                    let block_size = ctx.cfg().block_size as usize;
                    let mut buf = vec![0u8; block_size];
                    let mut done = 0;
                    while done < blocks {
                        bd_read(ctx, done, &mut buf);
                        if buf != pattern(done, block_size) {
                            break;
                        }
                        done += 1;
                    }
                    bd_trace!("resume at block {} after {} power losses", done, ctx.powerlosses());

                    for block in done..blocks {
                        bd_erase(ctx, block)?;
                        bd_prog(ctx, block, &pattern(block, block_size))?;
                    }

                    for block in 0..blocks {
                        bd_read(ctx, block, &mut buf);
                        test_assert!(
                            buf == pattern(block, block_size),
                            "block {} lost its pattern",
                            block
                        );
                    }
                    Ok(())
                }),
        )
        .build()
}

fn pattern(block: usize, block_size: usize) -> Vec<u8> {
    let mut state = prng::permutation_seed(PATTERN_SEED, block);
    let mut data = vec![0u8; block_size];
    prng::fill_bytes(&mut state, &mut data);
    data
}

/// Size the disk image to the configured device, erased.
fn bd_mount(ctx: &mut TestContext<'_>) {
    let size = ctx.cfg().size() as usize;
    let erase_value = erased_byte(ctx);
    let disk = ctx.disk();
    if disk.len() != size {
        disk.resize(size, erase_value);
    }
}

fn bd_read(ctx: &mut TestContext<'_>, block: usize, buf: &mut [u8]) {
    bd_trace!("bd_read({:#x}, {})", block, buf.len());
    let start = block * ctx.cfg().block_size as usize;
    buf.copy_from_slice(&ctx.disk()[start..start + buf.len()]);
}

fn bd_prog(ctx: &mut TestContext<'_>, block: usize, data: &[u8]) -> Result<(), TestError> {
    bd_trace!("bd_prog({:#x}, {})", block, data.len());
    ctx.power_cycle()?;
    let start = block * ctx.cfg().block_size as usize;
    ctx.disk()[start..start + data.len()].copy_from_slice(data);
    Ok(())
}

fn bd_erase(ctx: &mut TestContext<'_>, block: usize) -> Result<(), TestError> {
    bd_trace!("bd_erase({:#x})", block);
    ctx.power_cycle()?;
    let block_size = ctx.cfg().block_size as usize;
    let erase_value = erased_byte(ctx);
    let start = block * block_size;
    ctx.disk()[start..start + block_size].fill(erase_value);
    Ok(())
}

fn erased_byte(ctx: &TestContext<'_>) -> u8 {
    // -1 leaves erased contents undefined, zero is as good as anything
    u8::try_from(ctx.cfg().erase_value).unwrap_or(0)
}
