// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_list_markdown(sections: usize, depth: usize) -> String {
    let mut content = String::new();
    for section in 0..sections {
        content.push_str(&format!("## Section {section}\n\n"));
        for item in 0..4 {
            push_item(&mut content, 0, depth, item);
        }
        content.push('\n');
    }
    content
}

#[allow(dead_code)]
fn push_item(content: &mut String, level: usize, depth: usize, item: usize) {
    content.push_str(&format!(
        "{}- Item {item} at level {level}\n",
        "  ".repeat(level)
    ));
    if level + 1 < depth {
        for child in 0..2 {
            push_item(content, level + 1, depth, child);
        }
    }
}
