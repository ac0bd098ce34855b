//! Statement compiler benchmarks
//!
//! ```bash
//! cargo bench            # everything
//! cargo bench imports    # import rewriting only
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tsrepl::repl::compiler::await_rewrite;
use tsrepl::repl::{ImportRewriter, StatementCompiler};

const IMPORT_LINE: &str = "import main, { foo, bar as baz } from './some_module'; main(foo, baz)";

const SUSPENDING: &str = "const { users, total } = await db.query('select * from users')\n\
    function page(n) { return users.slice(n * 10, n * 10 + 10) }\n\
    await Promise.all([page(0), page(1)].map(async p => p.length))";

const PLAIN: &str = "class Cache { constructor() { this.items = new Map() } }\n\
    const cache = new Cache()\n\
    for (const [k, v] of entries) cache.items.set(k, () => v)";

fn bench_imports(c: &mut Criterion) {
    let rewriter = ImportRewriter::new();
    c.bench_function("imports/rewrite", |b| {
        b.iter(|| rewriter.rewrite(black_box(IMPORT_LINE)))
    });
    c.bench_function("imports/identity", |b| {
        b.iter(|| rewriter.rewrite(black_box(PLAIN)))
    });
}

fn bench_await(c: &mut Criterion) {
    c.bench_function("await/rewrite", |b| {
        b.iter(|| await_rewrite::rewrite(black_box(SUSPENDING)))
    });
    c.bench_function("await/scan_only", |b| {
        b.iter(|| await_rewrite::rewrite(black_box(PLAIN)))
    });
}

fn bench_statement_compiler(c: &mut Criterion) {
    let compiler = StatementCompiler::new(None);
    c.bench_function("compiler/statement", |b| {
        b.iter(|| compiler.compile(black_box(SUSPENDING), "REPL1"))
    });
}

criterion_group!(imports, bench_imports);
criterion_group!(await_rewrites, bench_await);
criterion_group!(compiler, bench_statement_compiler);
criterion_main!(imports, await_rewrites, compiler);
