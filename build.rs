fn main() {
    prost_build::compile_protos(&["proto/vector_tile.proto"], &["proto"])
        .expect("compiling vector_tile.proto");
}
