use sparsejit::{
    BinaryOp, BinaryOpcode, Context, IndexUnaryOp, JitRuntime, Monoid, SparseMatrix, UnaryOp, UnaryOpcode,
};

fn main() -> sparsejit::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("sparsejit {}", sparsejit::VERSION);

    let a = SparseMatrix::from_triplets(
        4,
        4,
        &[(0, 0, 4.0), (1, 0, -1.0), (1, 1, 4.0), (2, 1, -1.0), (2, 2, 4.0), (3, 2, -1.0), (3, 3, 4.0)],
    )?;
    println!("\nMatrix A:\n{a:?}");

    let ctx = Context::default();
    let config = ctx.jit().config();
    println!("\nJIT control: {:?}", config.control);
    println!("Kernel cache: {}", config.cache_path.display());
    println!("Threads: {}", ctx.params.n_threads);

    let lower = ctx.select(&a, &IndexUnaryOp::Tril(-1), false)?;
    println!("\nStrictly lower part of A: {:?}", lower.extract_tuples());

    let negated = ctx.apply(&a, &UnaryOp::Builtin(UnaryOpcode::Ainv))?;
    println!("-A(1,0) = {:?}", negated.get(1, 0));

    let d = SparseMatrix::from_triplets(4, 4, &[(0, 0, 1.0), (1, 1, 2.0), (2, 2, 3.0), (3, 3, 4.0)])?;
    let scaled = ctx.rowscale(&d, &a, &BinaryOp::Builtin(BinaryOpcode::Times), false)?;
    println!("(D*A)(3,2) = {:?}", scaled.get(3, 2));

    let sum = ctx.reduce(&a, &Monoid::builtin(BinaryOpcode::Plus)?)?;
    println!("sum(A) = {sum}");

    let stats = ctx.jit().stats();
    println!(
        "\nKernels: {} cached, {} loaded, {} compiled, {} generic",
        stats.hits, stats.loads, stats.compiles, stats.fallbacks
    );

    JitRuntime::teardown();
    Ok(())
}
