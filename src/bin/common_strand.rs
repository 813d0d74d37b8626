use std::fs;
use std::io;
use std::path::PathBuf;

use structopt::StructOpt;
use strand_tree::SuffixTree;

/// Finds the longest strand of bytes shared by at least two of the
/// given files and reports where it occurs.
#[derive(StructOpt)]
struct Options {
    /// Files to compare; at least two.
    #[structopt(name = "FILE", parse(from_os_str), required = true, min_values = 2)]
    files: Vec<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = Options::from_args();

    let mut contents: Vec<Vec<u8>> = Vec::with_capacity(options.files.len());
    for path in &options.files {
        contents.push(fs::read(path)?);
    }
    let inputs: Vec<&[u8]> = contents.iter().map(|data| data.as_slice()).collect();

    let tree = SuffixTree::from_sequences(&inputs)
        .expect("suffix tree construction violated an invariant");

    match tree.longest_common() {
        Some((length, occurrences)) => {
            println!(
                "Length of the longest strand of bytes that exists in at least two files: {}",
                length
            );
            for (k, offset) in occurrences {
                let start = (tree.input_len(k) as isize + offset) as usize;
                println!(
                    "It appears at offset {} in {}",
                    start,
                    options.files[k].display()
                );
            }
        }
        None => println!("No strand of bytes is shared by two of the files."),
    }

    Ok(())
}
