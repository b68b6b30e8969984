#![allow(clippy::missing_panics_doc)]

mod utils;

mod fixture;
mod governance;

use s3s_test::tcx::TestContext;

fn register(tcx: &mut TestContext) {
    governance::register(tcx);
}

s3s_test::main!(register);
