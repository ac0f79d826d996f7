//! Track enrichment: chart entry → identified track with audio features.
//!
//! Resolution is two lookups, both served from the [`CacheStore`] when
//! possible:
//!
//! 1. **Search** — the normalized query (see [`normalize`]) is the cache key
//!    for the raw search response. A live response is cached in full before
//!    it is used, even when it has no hits. A null response is not cached.
//! 2. **Features** — the audio-feature record for the resolved id is cached
//!    under `features:<id>`. Missing or incomplete records are not cached,
//!    so a later run can try again.
//!
//! Enriching one track is all-or-nothing. Enriching a chart tolerates
//! per-track failures: failed entries are reported in
//! [`Enrichment::dropped`] and the rest carry on.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::cache::{features_key, CacheStore};
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{first_track, MetadataService, TrackIdentity};
use crate::models::{AudioFeatures, RankedTrack, RawTrack, ResolvedTrack, Track};
use crate::normalize::normalize;

/// Outcome of enriching a whole chart.
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Resolved tracks in chart order.
    pub tracks: Vec<RankedTrack>,
    /// Entries that could not be resolved, in chart order.
    pub dropped: Vec<DroppedTrack>,
}

#[derive(Debug, Clone)]
pub struct DroppedTrack {
    pub rank: usize,
    pub raw: RawTrack,
    pub error: PipelineError,
}

impl Enrichment {
    /// Every chart entry in rank order, resolved where possible.
    pub fn entries(&self) -> Vec<(usize, Track)> {
        let mut all: Vec<(usize, Track)> = self
            .tracks
            .iter()
            .map(|t| (t.rank, Track::Resolved(t.track.clone())))
            .chain(self.dropped.iter().map(|d| (d.rank, Track::Raw(d.raw.clone()))))
            .collect();
        all.sort_by_key(|(rank, _)| *rank);
        all
    }

    pub fn resolved(&self) -> Vec<ResolvedTrack> {
        self.tracks.iter().map(|t| t.track.clone()).collect()
    }
}

/// Resolves raw chart entries against a [`MetadataService`].
pub struct TrackEnricher<'a> {
    service: &'a dyn MetadataService,
}

impl<'a> TrackEnricher<'a> {
    pub fn new(service: &'a dyn MetadataService) -> Self {
        Self { service }
    }

    /// Resolve a single chart entry.
    ///
    /// # Errors
    ///
    /// [`PipelineError::LookupFailure`] if the search has no hits or the
    /// feature record is incomplete; [`PipelineError::ExternalService`] if
    /// the service could not be reached.
    pub async fn resolve(
        &self,
        raw: &RawTrack,
        cache: &mut CacheStore,
    ) -> PipelineResult<ResolvedTrack> {
        let (query, identity) = self.identify(raw, cache).await?;
        let record = match cached_features(cache, &identity.id) {
            Some(record) => record,
            None => {
                let mut records = self.service.features_for(&[identity.id.clone()]).await?;
                let record = if records.is_empty() {
                    Value::Null
                } else {
                    records.swap_remove(0)
                };
                store_features(cache, &identity.id, &record);
                record
            }
        };
        build_resolved(&query, identity, &record)
    }

    /// Resolve every entry of a chart, dropping the ones that fail.
    ///
    /// Feature records for all uncached ids are requested in one
    /// `features_for` call. If that call fails, every track waiting on it is
    /// dropped with the service error.
    pub async fn resolve_all(&self, raws: &[RawTrack], cache: &mut CacheStore) -> Enrichment {
        let mut dropped = Vec::new();
        let mut identified = Vec::new();

        for (idx, raw) in raws.iter().enumerate() {
            let rank = idx + 1;
            match self.identify(raw, cache).await {
                Ok((query, identity)) => identified.push((rank, raw, query, identity)),
                Err(error) => {
                    warn!(rank, title = %raw.title, artist = %raw.artist, "dropping track: {}", error);
                    dropped.push(DroppedTrack {
                        rank,
                        raw: raw.clone(),
                        error,
                    });
                }
            }
        }

        let mut pending: Vec<String> = Vec::new();
        for (_, _, _, identity) in &identified {
            if cached_features(cache, &identity.id).is_none() && !pending.contains(&identity.id) {
                pending.push(identity.id.clone());
            }
        }

        // Fetched records are kept locally too, in case caching them fails.
        let mut fetched: HashMap<String, Value> = HashMap::new();
        let mut batch_error: Option<PipelineError> = None;
        if !pending.is_empty() {
            match self.service.features_for(&pending).await {
                Ok(records) => {
                    for (id, record) in pending.iter().zip(records) {
                        store_features(cache, id, &record);
                        fetched.insert(id.clone(), record);
                    }
                }
                Err(e) => {
                    warn!(count = pending.len(), "audio feature lookup failed: {}", e);
                    batch_error = Some(e);
                }
            }
        }

        let mut tracks = Vec::new();
        for (rank, raw, query, identity) in identified {
            let record = fetched
                .get(&identity.id)
                .cloned()
                .or_else(|| cached_features(cache, &identity.id));
            let result = match (record, &batch_error) {
                (Some(record), _) => build_resolved(&query, identity, &record),
                (None, Some(e)) => Err(e.clone()),
                (None, None) => Err(PipelineError::lookup(&query)),
            };
            match result {
                Ok(track) => tracks.push(RankedTrack { rank, track }),
                Err(error) => {
                    warn!(rank, title = %raw.title, "dropping track: {}", error);
                    dropped.push(DroppedTrack {
                        rank,
                        raw: raw.clone(),
                        error,
                    });
                }
            }
        }

        dropped.sort_by_key(|d| d.rank);
        Enrichment { tracks, dropped }
    }

    /// Normalize, search (through the cache), and take the first hit.
    async fn identify(
        &self,
        raw: &RawTrack,
        cache: &mut CacheStore,
    ) -> PipelineResult<(String, TrackIdentity)> {
        let query = normalize(&raw.title, &raw.artist);

        let response = match cache.get(&query) {
            Some(cached) => {
                debug!(%query, "search cache hit");
                cached.clone()
            }
            None => {
                debug!(%query, "search cache miss");
                let response = self.service.search(&query).await?;
                if response.is_null() {
                    return Err(PipelineError::lookup(&query));
                }
                if let Err(e) = cache.put(&query, response.clone()) {
                    warn!(%query, "could not cache search response: {:#}", e);
                }
                response
            }
        };

        let identity = first_track(&response).ok_or_else(|| PipelineError::lookup(&query))?;
        Ok((query, identity))
    }
}

fn cached_features(cache: &CacheStore, id: &str) -> Option<Value> {
    cache
        .get(&features_key(id))
        .filter(|v| !v.is_null())
        .cloned()
}

fn store_features(cache: &mut CacheStore, id: &str, record: &Value) {
    if AudioFeatures::from_record(record).is_none() {
        debug!(id, "not caching incomplete audio features");
        return;
    }
    if let Err(e) = cache.put(&features_key(id), record.clone()) {
        warn!(id, "could not cache audio features: {:#}", e);
    }
}

fn build_resolved(
    query: &str,
    identity: TrackIdentity,
    record: &Value,
) -> PipelineResult<ResolvedTrack> {
    let features = AudioFeatures::from_record(record).ok_or_else(|| PipelineError::lookup(query))?;
    Ok(ResolvedTrack {
        id: identity.id,
        title: identity.title,
        artist: identity.artist,
        album: identity.album,
        features,
    })
}
