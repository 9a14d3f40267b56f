//! Session orchestration: select one session from a channel table, run the
//! ECG pipeline, then align every mechanical channel to its R-peaks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    channels::{BcgRecord, ChannelKind, ChannelRecord, EcgRecord, ImuRecord, PpgRecord},
    config::{ChannelMap, PipelineConfig, SearchWindow},
    detectors::references_within,
    error::{PipelineError, Result},
    io::ColumnTable,
    metrics::{summarize_ptt, PttSummary},
    signal::{Events, Signal},
};

/// Raw channels of one session, re-indexed so the first row is sample 0.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: i64,
    pub ecg: Signal,
    pub bcg: Option<Signal>,
    pub ppg: Option<Signal>,
    pub imu: Vec<Signal>,
}

impl SessionData {
    /// Every column the map refers to, session column included.
    pub fn columns(map: &ChannelMap) -> Vec<&str> {
        let mut names = vec![map.ecg.as_str()];
        names.extend(map.bcg.as_deref());
        names.extend(map.ppg.as_deref());
        names.extend(map.imu.iter().map(String::as_str));
        names.extend(map.session.as_deref());
        names
    }

    /// Rows whose session column equals `id`. Without a session column all
    /// rows belong to the session.
    pub fn select(table: &ColumnTable, map: &ChannelMap, fs: u32, id: i64) -> Result<Self> {
        map.validate()?;
        let rows: Vec<usize> = match &map.session {
            Some(col) => lookup(table, "session", col)?
                .iter()
                .take(table.rows())
                .enumerate()
                .filter(|(_, v)| session_id(**v) == Some(id))
                .map(|(i, _)| i)
                .collect(),
            None => (0..table.rows()).collect(),
        };
        if rows.is_empty() {
            return Err(PipelineError::EmptySession(id));
        }
        let pick = |role: &'static str, col: &str| -> Result<Signal> {
            let values = lookup(table, role, col)?;
            Ok(Signal::new(col, fs, rows.iter().map(|&i| values[i]).collect()))
        };
        let ecg = pick("ecg", &map.ecg)?;
        let bcg = map.bcg.as_deref().map(|c| pick("bcg", c)).transpose()?;
        let ppg = map.ppg.as_deref().map(|c| pick("ppg", c)).transpose()?;
        let imu = map
            .imu
            .iter()
            .map(|c| pick("imu", c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id,
            ecg,
            bcg,
            ppg,
            imu,
        })
    }

    pub fn len(&self) -> usize {
        self.ecg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ecg.is_empty()
    }
}

fn lookup<'a>(table: &'a ColumnTable, role: &'static str, column: &str) -> Result<&'a [f64]> {
    table
        .column(column)
        .ok_or_else(|| PipelineError::MissingChannel {
            role,
            column: column.to_string(),
        })
}

fn session_id(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Distinct session ids in order of first appearance; `[0]` without a
/// session column.
pub fn session_ids(table: &ColumnTable, map: &ChannelMap) -> Result<Vec<i64>> {
    let Some(col) = &map.session else {
        return Ok(vec![0]);
    };
    let mut ids = Vec::new();
    for id in lookup(table, "session", col)?.iter().filter_map(|v| session_id(*v)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// All processed channels of one session.
#[derive(Debug, Clone)]
pub struct Recording {
    pub session: i64,
    pub label: String,
    pub ecg: EcgRecord,
    pub bcg: Option<BcgRecord>,
    pub ppg: Option<PpgRecord>,
    pub imu: Option<ImuRecord>,
    /// Mechanical channels that were mapped but could not be processed.
    pub failed: BTreeMap<ChannelKind, PipelineError>,
}

impl Recording {
    pub fn process(data: &SessionData, cfg: &PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        for (kind, strategy) in [
            (ChannelKind::Ecg, cfg.ecg.sanitize),
            (ChannelKind::Bcg, cfg.bcg.sanitize),
            (ChannelKind::Ppg, cfg.ppg.sanitize),
            (ChannelKind::Imu, cfg.imu.bcg.sanitize),
        ] {
            if !strategy.preserves_alignment() {
                return Err(PipelineError::invalid(
                    "session",
                    format!("{kind}: quantile trimming breaks cross-channel alignment"),
                ));
            }
        }

        let label = cfg.labels.label(data.id);
        log::info!("session {} ({}): {} samples", data.id, label, data.len());
        let ecg = EcgRecord::process(&data.ecg, &cfg.ecg)?;
        let r_peaks = &ecg.r_peaks;

        let mut failed = BTreeMap::new();
        let bcg = data.bcg.as_ref().and_then(|raw| {
            let outcome = paired_references(ChannelKind::Bcg, r_peaks, &cfg.bcg.j_window, raw)
                .and_then(|refs| BcgRecord::process(raw, &refs, &cfg.bcg));
            keep(ChannelKind::Bcg, outcome, &mut failed)
        });
        let ppg = data.ppg.as_ref().and_then(|raw| {
            let outcome =
                paired_references(ChannelKind::Ppg, r_peaks, &cfg.ppg.trough_window, raw)
                    .and_then(|refs| PpgRecord::process(raw, &refs, &cfg.ppg));
            keep(ChannelKind::Ppg, outcome, &mut failed)
        });
        let imu = data.imu.first().and_then(|axis| {
            let outcome =
                paired_references(ChannelKind::Imu, r_peaks, &cfg.imu.bcg.j_window, axis)
                    .and_then(|refs| ImuRecord::process(&data.imu, &refs, &cfg.imu));
            keep(ChannelKind::Imu, outcome, &mut failed)
        });

        Ok(Self {
            session: data.id,
            label,
            ecg,
            bcg,
            ppg,
            imu,
            failed,
        })
    }

    pub fn r_peaks(&self) -> &Events {
        &self.ecg.r_peaks
    }

    /// Processed record for `kind`, if that channel was mapped and succeeded.
    pub fn channel(&self, kind: ChannelKind) -> Option<&dyn ChannelRecord> {
        match kind {
            ChannelKind::Ecg => Some(&self.ecg),
            ChannelKind::Bcg => self.bcg.as_ref().map(|r| r as &dyn ChannelRecord),
            ChannelKind::Ppg => self.ppg.as_ref().map(|r| r as &dyn ChannelRecord),
            ChannelKind::Imu => self.imu.as_ref().map(|r| r as &dyn ChannelRecord),
        }
    }

    pub fn report(&self) -> Result<SessionReport> {
        let r_peaks = self.r_peaks();
        let mut channels = BTreeMap::new();
        if let Some(bcg) = &self.bcg {
            channels.insert(
                ChannelKind::Bcg,
                ChannelReport::new(&bcg.r_peaks, &bcg.j_peaks, bcg.transit_times()?),
            );
        }
        if let Some(ppg) = &self.ppg {
            let mut report =
                ChannelReport::new(&ppg.r_peaks, &ppg.troughs, ppg.transit_times()?);
            report.upstroke_ms = Some(ppg.upstroke_times()?);
            channels.insert(ChannelKind::Ppg, report);
        }
        if let Some(imu) = &self.imu {
            channels.insert(
                ChannelKind::Imu,
                ChannelReport::new(imu.r_peaks(), imu.j_peaks(), imu.transit_times()?),
            );
        }
        Ok(SessionReport {
            session: self.session,
            label: self.label.clone(),
            fs: self.ecg.raw.fs,
            samples: self.ecg.raw.len(),
            duration_s: self.ecg.raw.duration(),
            heart_rate_bpm: self.ecg.heart_rate_bpm,
            r_peaks: r_peaks.indices.clone(),
            channels,
            failed: self
                .failed
                .iter()
                .map(|(kind, err)| (*kind, err.to_string()))
                .collect(),
        })
    }
}

/// R-peaks whose search window fits inside `raw`. A channel left with no
/// reference at all fails instead of reporting an empty series.
fn paired_references(
    kind: ChannelKind,
    r_peaks: &Events,
    window: &SearchWindow,
    raw: &Signal,
) -> Result<Events> {
    let kept = references_within(r_peaks, window, raw.fs, raw.len());
    let dropped = r_peaks.len() - kept.len();
    if dropped > 0 {
        log::debug!("{kind}: dropped {dropped} R-peaks whose search window leaves the signal");
    }
    if kept.is_empty() {
        return Err(PipelineError::InsufficientEvents {
            required: 1,
            found: 0,
        });
    }
    Ok(kept)
}

fn keep<T>(
    kind: ChannelKind,
    outcome: Result<T>,
    failed: &mut BTreeMap<ChannelKind, PipelineError>,
) -> Option<T> {
    match outcome {
        Ok(record) => Some(record),
        Err(err) => {
            log::warn!("{kind} channel failed: {err}");
            failed.insert(kind, err);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    /// R-peaks paired one-to-one with `events` and `ptt_ms`.
    pub r_peaks: Vec<usize>,
    pub events: Vec<usize>,
    pub ptt_ms: Vec<f64>,
    pub summary: Option<PttSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstroke_ms: Option<Vec<f64>>,
}

impl ChannelReport {
    fn new(r_peaks: &Events, events: &Events, ptt_ms: Vec<f64>) -> Self {
        Self {
            r_peaks: r_peaks.indices.clone(),
            events: events.indices.clone(),
            summary: summarize_ptt(&ptt_ms),
            ptt_ms,
            upstroke_ms: None,
        }
    }
}

/// Serializable outcome of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: i64,
    pub label: String,
    pub fs: u32,
    pub samples: usize,
    pub duration_s: f64,
    pub heart_rate_bpm: f64,
    pub r_peaks: Vec<usize>,
    pub channels: BTreeMap<ChannelKind, ChannelReport>,
    pub failed: BTreeMap<ChannelKind, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::bcg::tests::synthetic_bcg;
    use crate::channels::ecg::tests::synthetic_ecg;
    use crate::channels::ppg::tests::synthetic_ppg;
    use crate::config::SanitizeStrategy;

    const FS: u32 = 2000;

    fn beats(n: usize, offset: usize) -> Vec<usize> {
        (0..n).map(|k| offset + 1000 + 1600 * k).collect()
    }

    /// Two sessions back to back: ids 1 then 2, each 10 beats long.
    fn table() -> ColumnTable {
        let len = 1000 + 1600 * 10;
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for id in [1.0, 2.0] {
            let b = beats(10, 0);
            let ecg = synthetic_ecg(FS, &b, len);
            let bcg = synthetic_bcg(FS, &b, 450, len);
            let ppg = synthetic_ppg(FS, &b, 400, len);
            columns.entry("ecg".into()).or_default().extend(ecg.data);
            columns.entry("bcg".into()).or_default().extend(bcg.data);
            columns.entry("ppg".into()).or_default().extend(ppg.data);
            columns
                .entry("activity".into())
                .or_default()
                .extend(std::iter::repeat(id).take(len));
        }
        ColumnTable::from_columns(columns)
    }

    fn map() -> ChannelMap {
        ChannelMap {
            ecg: "ecg".into(),
            bcg: Some("bcg".into()),
            ppg: Some("ppg".into()),
            imu: Vec::new(),
            session: Some("activity".into()),
        }
    }

    #[test]
    fn session_is_selected_and_reindexed() {
        let table = table();
        assert_eq!(session_ids(&table, &map()).expect("ids"), vec![1, 2]);
        let data = SessionData::select(&table, &map(), FS, 2).expect("select");
        assert_eq!(data.len(), table.rows() / 2);
        assert_eq!(data.ecg.data[..], table.column("ecg").expect("ecg")[data.len()..]);
    }

    #[test]
    fn session_report_aligns_every_channel() {
        let data = SessionData::select(&table(), &map(), FS, 1).expect("select");
        let mut cfg = PipelineConfig::default();
        cfg.labels.insert(1, "supine");
        let recording = Recording::process(&data, &cfg).expect("process");
        let report = recording.report().expect("report");

        assert_eq!(report.label, "supine");
        assert_eq!(report.heart_rate_bpm, 75.0);
        assert_eq!(report.r_peaks.len(), 10);
        assert!(report.failed.is_empty());
        let bcg = &report.channels[&ChannelKind::Bcg];
        assert_eq!(bcg.ptt_ms.len(), 10);
        let summary = bcg.summary.as_ref().expect("summary");
        assert!((summary.mean_ms - 225.0).abs() < 15.0);
        let ppg = &report.channels[&ChannelKind::Ppg];
        assert_eq!(ppg.events.len(), 10);
        assert_eq!(ppg.r_peaks, report.r_peaks);
        assert_eq!(ppg.upstroke_ms.as_ref().map(Vec::len), Some(10));
        assert!(recording.channel(ChannelKind::Imu).is_none());

        let json = serde_json::to_value(&report).expect("json");
        assert!(json["channels"]["bcg"]["ptt_ms"].is_array());
    }

    #[test]
    fn failing_mechanical_channel_is_reported_not_fatal() {
        let mut data = SessionData::select(&table(), &map(), FS, 1).expect("select");
        // Ends before the first J window.
        if let Some(bcg) = data.bcg.as_mut() {
            bcg.data.truncate(500);
        }
        let recording = Recording::process(&data, &PipelineConfig::default()).expect("process");
        assert!(recording.bcg.is_none());
        assert_eq!(
            recording.failed.get(&ChannelKind::Bcg),
            Some(&PipelineError::InsufficientEvents {
                required: 1,
                found: 0
            })
        );
        let report = recording.report().expect("report");
        assert!(report.failed.contains_key(&ChannelKind::Bcg));
        assert!(report.channels.contains_key(&ChannelKind::Ppg));
    }

    #[test]
    fn short_tail_drops_only_the_last_reference() {
        let mut data = SessionData::select(&table(), &map(), FS, 1).expect("select");
        // Recording stops 60 ms after the last R-peak.
        let len = beats(10, 0)[9] + 120;
        data.ecg.data.truncate(len);
        for signal in [data.bcg.as_mut(), data.ppg.as_mut()].into_iter().flatten() {
            signal.data.truncate(len);
        }
        let recording = Recording::process(&data, &PipelineConfig::default()).expect("process");
        assert!(recording.failed.is_empty(), "{:?}", recording.failed);
        let report = recording.report().expect("report");
        assert_eq!(report.r_peaks.len(), 10);

        let bcg = &report.channels[&ChannelKind::Bcg];
        assert_eq!(bcg.r_peaks, report.r_peaks[..9].to_vec());
        assert_eq!(bcg.ptt_ms.len(), 9);
        for ms in &bcg.ptt_ms {
            assert!((ms - 225.0).abs() < 15.0, "R-J interval {ms} ms");
        }
        let ppg = &report.channels[&ChannelKind::Ppg];
        assert_eq!(ppg.r_peaks.len(), ppg.events.len());
        for ms in &ppg.ptt_ms[1..] {
            assert!((ms - 200.0).abs() < 20.0, "R-trough interval {ms} ms");
        }
        for r in bcg.r_peaks.iter().chain(&ppg.r_peaks) {
            assert!(r + ((0.35 * FS as f64) as usize) < len);
        }
    }

    #[test]
    fn missing_column_and_empty_session() {
        let table = table();
        let mut bad = map();
        bad.ppg = Some("PPG finger".into());
        let err = SessionData::select(&table, &bad, FS, 1).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingChannel {
                role: "ppg",
                column: "PPG finger".into()
            }
        );
        let err = SessionData::select(&table, &map(), FS, 9).unwrap_err();
        assert_eq!(err, PipelineError::EmptySession(9));
    }

    #[test]
    fn quantile_trim_is_rejected_for_sessions() {
        let data = SessionData::select(&table(), &map(), FS, 1).expect("select");
        let mut cfg = PipelineConfig::default();
        cfg.bcg.sanitize = SanitizeStrategy::QuantileTrim;
        let err = Recording::process(&data, &cfg).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter { stage: "session", .. }));
    }
}
