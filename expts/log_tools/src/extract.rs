//! Extraction of telemetry embedded in simulator logs.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::Path,
};

use log::warn;

/// Marker of the rate telemetry messages in a qlog.
pub const RATE_MARKER: &str = "C4_rate";

/// One rate telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateSample {
    pub time: i64,
    pub rate: i64,
    pub n_rate: i64,
    pub bytes: i64,
    pub rtt: i64,
    pub send_delay: i64,
    pub nominal_rtt: i64,
    pub state: i64,
    pub path_bw: i64,
    #[serde(rename = "is_cc")]
    pub is_cc: i64,
}

impl RateSample {
    // [time, "category", "type", {"message": "C4_rate, rate, n-rate, ..., is_cc"}],
    const NR_FIELDS: usize = 13;
    const FIRST_VALUE: usize = 4;

    /// Parses a rate message line, or returns `None` if the line carries no rate message.
    pub fn from_line(line: &str) -> Option<Result<Self, Error>> {
        if !line.contains(RATE_MARKER) {
            return None;
        }
        let line = line.trim();
        let line = line.strip_prefix('[').unwrap_or(line);
        let line = line.strip_suffix("\"}],").unwrap_or(line);
        Some(Self::from_fields(&line.split(',').collect::<Vec<_>>()))
    }

    fn from_fields(fields: &[&str]) -> Result<Self, Error> {
        if fields.len() != Self::NR_FIELDS {
            return Err(Error::WrongNrFields {
                expected: Self::NR_FIELDS,
                got: fields.len(),
            });
        }
        let v = std::iter::once(fields[0])
            .chain(fields[Self::FIRST_VALUE..].iter().copied())
            .map(|f| f.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            time: v[0],
            rate: v[1],
            n_rate: v[2],
            bytes: v[3],
            rtt: v[4],
            send_delay: v[5],
            nominal_rtt: v[6],
            state: v[7],
            path_bw: v[8],
            is_cc: v[9],
        })
    }
}

/// Error parsing a rate message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Wrong number of fields (expected {expected}, got {got})")]
    WrongNrFields { expected: usize, got: usize },

    #[error("Failed to parse field")]
    ParseInt(#[from] std::num::ParseIntError),
}

/// Collects the rate messages of a log. Malformed messages are reported and skipped.
pub fn extract_rates(rdr: impl BufRead) -> io::Result<Vec<RateSample>> {
    let mut samples = Vec::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line?;
        match RateSample::from_line(&line) {
            Some(Ok(sample)) => samples.push(sample),
            Some(Err(e)) => warn!("line {}: {e}", i + 1),
            None => {}
        }
    }
    Ok(samples)
}

/// Annotates simulator logs with the experiment category encoded in their file names.
#[derive(Debug, Clone)]
pub struct Collector {
    pub pig_prefixes: Vec<String>,
    pub chaos_prefixes: Vec<String>,
}

impl Default for Collector {
    fn default() -> Self {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            pig_prefixes: owned(&["ccc0c4cb", "cc19c4cb", "cc1ac4cb", "badfc4cb"]),
            chaos_prefixes: owned(&["badf", "ed1ac4fb", "fadac4", "ccc0c41f"]),
        }
    }
}

impl Collector {
    pub const HEADER: &'static str = "file, c_time, nb_dec, cwin, rate, max_cwin, max_rate, \
        rtt_min, s_min, s_max, variant, smoothed, chaotic, pig_war, pw_entry, is_pig, is_chaos";

    pub fn is_pig(&self, file_name: &str) -> bool {
        self.pig_prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
    }

    pub fn is_chaos(&self, file_name: &str) -> bool {
        self.chaos_prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
    }

    /// Writes every line of every file in `log_dir`, prefixed with the file name and
    /// followed by the category flags. Returns the number of lines written.
    pub fn collect(&self, log_dir: impl AsRef<Path>, mut out: impl Write) -> io::Result<usize> {
        let mut files = fs::read_dir(log_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        files.retain(|p| p.is_file());
        files.sort();

        writeln!(out, "{}", Self::HEADER)?;
        let mut nr_lines = 0;
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let flag = |b: bool| if b { "1" } else { "0" };
            let (is_pig, is_chaos) = (flag(self.is_pig(&file_name)), flag(self.is_chaos(&file_name)));
            for line in io::BufReader::new(fs::File::open(&path)?).lines() {
                writeln!(out, "{file_name},{},{is_pig},{is_chaos}", line?.trim())?;
                nr_lines += 1;
            }
        }
        out.flush()?;
        Ok(nr_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QLOG: &str = r#"{"qlog_version": "0.3", "traces": [{"events": [
[1000, "transport", "packet_sent", {"header": {}}],
[1234, "info", "message", {"message": "C4_rate, 10, 20, 30, 40, 50, 60, 2, 70, 1"}],
[2345, "info", "message", {"message": "C4_rate, 11, 21, 31, 41, 51, 61, 3, 71, 0"}],
[3456, "info", "message", {"message": "C4_rate, 12, oops"}],
"#;

    #[test]
    fn parse_rate_line() {
        let line = r#"[1234, "info", "message", {"message": "C4_rate, 10, 20, 30, 40, 50, 60, 2, 70, 1"}],"#;
        let sample = RateSample::from_line(line).unwrap().unwrap();
        assert_eq!(
            sample,
            RateSample {
                time: 1234,
                rate: 10,
                n_rate: 20,
                bytes: 30,
                rtt: 40,
                send_delay: 50,
                nominal_rtt: 60,
                state: 2,
                path_bw: 70,
                is_cc: 1,
            }
        );
        assert!(RateSample::from_line("[1000, \"transport\"]").is_none());
    }

    #[test]
    fn extract_skips_malformed() -> anyhow::Result<()> {
        let samples = extract_rates(QLOG.as_bytes())?;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time, 2345);

        let mut wtr = csv::Writer::from_writer(Vec::new());
        for sample in &samples {
            wtr.serialize(sample)?;
        }
        let out = String::from_utf8(wtr.into_inner()?)?;
        insta::assert_snapshot!(out, @r###"
        time,rate,n-rate,bytes,rtt,send-delay,nominal-rtt,state,path-bw,is_cc
        1234,10,20,30,40,50,60,2,70,1
        2345,11,21,31,41,51,61,3,71,0
        "###);
        Ok(())
    }

    #[test]
    fn collect_flags_categories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("badfc4cb_run1.csv"), "1, 2\n3, 4\n")?;
        fs::write(dir.path().join("fadac4_run2.csv"), " 5, 6 \n")?;
        fs::write(dir.path().join("other.csv"), "7, 8\n")?;
        let mut out = Vec::new();
        let nr_lines = Collector::default().collect(dir.path(), &mut out)?;
        assert_eq!(nr_lines, 4);
        let out = String::from_utf8(out)?;
        let rows = out.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                "badfc4cb_run1.csv,1, 2,1,1",
                "badfc4cb_run1.csv,3, 4,1,1",
                "fadac4_run2.csv,5, 6,0,1",
                "other.csv,7, 8,0,0",
            ]
        );
        Ok(())
    }
}
