fn main() {
    // askama embeds the violation list template at compile time.
    println!("cargo:rerun-if-changed=templates/violations.html");
}
