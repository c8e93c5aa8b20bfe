fn main() {
    uast_transformer::cli::run();
}
