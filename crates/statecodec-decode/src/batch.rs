//! Drivers for many decodings at once.
//!
//! [`RoundRobin`] advances a set of decodings in lockstep and answers each
//! round's requests in one batch, so a provider backed by a node can turn a
//! round into a single batched RPC call. [`decode_logs_par`] decodes
//! independent logs in parallel with Rayon.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{DecodeFailure, ProtocolError};
use crate::event::LogDecoding;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::{DecodeJob, Decoding, DefaultingProvider};
use crate::request::{DecoderRequest, Response, Step};
use crate::state::{EvmState, Log};

/// Answers a batch of requests, one response per request, in order.
pub trait BatchProvider {
    fn respond_all(&mut self, requests: &[DecoderRequest]) -> Vec<Response>;
}

impl<F> BatchProvider for F
where
    F: FnMut(&[DecoderRequest]) -> Vec<Response>,
{
    fn respond_all(&mut self, requests: &[DecoderRequest]) -> Vec<Response> {
        self(requests)
    }
}

impl BatchProvider for DefaultingProvider {
    fn respond_all(&mut self, requests: &[DecoderRequest]) -> Vec<Response> {
        requests.iter().map(|r| self.lookup(r)).collect()
    }
}

pub struct RoundRobin<J: DecodeJob> {
    decodings: Vec<Decoding<J>>,
}

impl<J: DecodeJob> RoundRobin<J> {
    pub fn new(decodings: Vec<Decoding<J>>) -> Self {
        Self { decodings }
    }

    pub fn push(&mut self, decoding: Decoding<J>) {
        self.decodings.push(decoding);
    }

    pub fn len(&self) -> usize {
        self.decodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decodings.is_empty()
    }

    /// Run every decoding to the end. Identical requests within a round are
    /// sent once. Results come back in the order the decodings were added.
    pub fn run<P: BatchProvider + ?Sized>(
        self,
        provider: &mut P,
    ) -> Vec<Result<J::Output, DecodeFailure>> {
        let mut decodings = self.decodings;
        let total = decodings.len();
        let mut results: Vec<Option<Result<J::Output, DecodeFailure>>> =
            (0..total).map(|_| None).collect();
        let mut responses: Vec<Option<Response>> = vec![None; total];
        let mut rounds = 0usize;

        loop {
            let mut waiting = Vec::new();
            for (idx, decoding) in decodings.iter_mut().enumerate() {
                if results[idx].is_some() {
                    continue;
                }
                match decoding.advance(responses[idx].take()) {
                    Ok(Step::Done(result)) => results[idx] = Some(result),
                    Ok(Step::Request(request)) => waiting.push((idx, request)),
                    Err(e) => results[idx] = Some(Err(e.into())),
                }
            }
            if waiting.is_empty() {
                break;
            }
            rounds += 1;

            let mut unique: Vec<DecoderRequest> = Vec::new();
            let mut positions: HashMap<DecoderRequest, usize> = HashMap::new();
            for (_, request) in &waiting {
                if !positions.contains_key(request) {
                    positions.insert(request.clone(), unique.len());
                    unique.push(request.clone());
                }
            }
            debug!(
                round = rounds,
                waiting = waiting.len(),
                requests = unique.len(),
                "RoundRobin: answering round"
            );
            let answers = provider.respond_all(&unique);

            for (idx, request) in waiting {
                match positions.get(&request).and_then(|&p| answers.get(p)) {
                    Some(answer) => responses[idx] = Some(answer.clone()),
                    None => results[idx] = Some(Err(ProtocolError::Missing { request }.into())),
                }
            }
        }

        // every slot is filled once no decoding is waiting
        let results: Vec<Result<J::Output, DecodeFailure>> =
            results.into_iter().flatten().collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            "RoundRobin: complete, {} decoded, {} failed, {} rounds",
            results.len() - failed,
            failed,
            rounds
        );
        results
    }
}

impl<J: DecodeJob> FromIterator<Decoding<J>> for RoundRobin<J> {
    fn from_iter<I: IntoIterator<Item = Decoding<J>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Decode `logs` in parallel using Rayon, answering requests from
/// `provider`. Returns `(decodings, failures)`, each tagged with the index of
/// its log.
pub fn decode_logs_par<P>(
    info: DecodingInfo<'_>,
    state: &EvmState,
    logs: &[Log],
    options: DecoderOptions,
    provider: &P,
) -> (Vec<(usize, Vec<LogDecoding>)>, Vec<(usize, DecodeFailure)>)
where
    P: Fn(&DecoderRequest) -> Response + Sync,
{
    let results: Vec<(usize, Result<Vec<LogDecoding>, DecodeFailure>)> = logs
        .par_iter()
        .enumerate()
        .map(|(idx, log)| {
            let mut respond = |request: &DecoderRequest| provider(request);
            (idx, Decoding::event(info, state, log, options).drive(&mut respond))
        })
        .collect();

    let mut decoded = Vec::new();
    let mut failures = Vec::new();
    for (idx, result) in results {
        match result {
            Ok(d) => decoded.push((idx, d)),
            Err(e) => failures.push((idx, e)),
        }
    }
    info!(
        "decode_logs_par: complete, {} logs decoded, {} errors",
        decoded.len(),
        failures.len()
    );
    (decoded, failures)
}
