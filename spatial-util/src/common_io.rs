use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file, e))?;
    match Path::new(input_file).extension().and_then(|x| x.to_str()) {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not, or `stdout`
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }

    let file = File::create(output_file)?;
    match Path::new(output_file).extension().and_then(|x| x.to_str()) {
        Some("gz") => Ok(Box::new(BufWriter::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )))),
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Read a delimited text file into rows of words. Lines starting with
/// `#` or `%` and blank lines are dropped.
///
/// * `input_file` - file name--either gzipped or not
/// * `delim` - any of these characters separates words
/// * `skip_header` - number of leading (non-comment) lines to skip
///
pub fn read_lines_of_words(
    input_file: &str,
    delim: &[char],
    skip_header: usize,
) -> anyhow::Result<Vec<Vec<Box<str>>>> {
    let buf = open_buf_reader(input_file)?;
    let mut ret = vec![];
    let mut skipped = 0;

    for line in buf.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }
        if skipped < skip_header {
            skipped += 1;
            continue;
        }
        let words: Vec<Box<str>> = line
            .split(|c: char| delim.contains(&c))
            .filter(|w| !w.is_empty())
            .map(Box::from)
            .collect();
        ret.push(words);
    }
    Ok(ret)
}

///
/// Write every line into the output_file
///
/// * `lines` - anything printable
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(anyhow::anyhow!("unexpected error: {}", e));
        }
    }
    buf.flush()?;
    Ok(())
}
