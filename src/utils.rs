use std::{fs, io};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

pub(crate) fn file_to_vec<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
    let file_in = fs::File::open(filename)?;
    let file_reader = BufReader::new(file_in);
    file_reader.lines().collect()
}

pub(crate) fn trace(profile: bool, l_type: &str, l_step: &str, start: Instant, _elapsed: Duration) -> Duration {
    if profile {
        log::info!("{} | Total={}ms | {}={:.2?}", l_type, start.elapsed().as_millis(), l_step, start.elapsed() - _elapsed);
    }
    else {
        log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, start.elapsed(), l_step, start.elapsed() - _elapsed);
    }
    start.elapsed()
}

/// Rounds to the nearest integer, ties going to the even neighbour.
pub(crate) fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_go_to_even() {
        assert_eq!(round_half_even(16.5), 16.0);
        assert_eq!(round_half_even(17.5), 18.0);
        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(16.0), 16.0);
        assert_eq!(round_half_even(16.6), 17.0);
    }

    #[test]
    fn reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "a.jpg 0\nb.jpg 1\n").unwrap();
        assert_eq!(file_to_vec(&path).unwrap(), vec!["a.jpg 0", "b.jpg 1"]);
    }
}
