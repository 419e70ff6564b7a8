//! Collapsed-Gibbs LDA, the bundled [`TopicModel`] backend.
//!
//! Sampling runs on a rayon pool of `num_workers` threads. Each iteration
//! shards the documents across the pool; every shard re-samples its tokens
//! against a snapshot of the global word-topic counts and the shard moves are
//! merged afterwards. Each token takes its highest-scoring topic, so a fit is
//! deterministic and independent of the worker count.

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::config::TopicConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::topic_modeling::{InstanceList, Topic, TopicModel, TopicReport};

#[derive(Debug, Clone, PartialEq)]
pub struct LdaConfig {
    pub alpha_sum: f64, // Document-topic concentration, split evenly across topics
    pub beta: f64,      // Topic-word concentration
    pub num_workers: usize,
    pub top_words: usize,
}

impl Default for LdaConfig {
    fn default() -> Self {
        LdaConfig {
            alpha_sum: 1.0,
            beta: 0.01,
            num_workers: 2,
            top_words: 10,
        }
    }
}

impl From<&TopicConfig> for LdaConfig {
    fn from(topics: &TopicConfig) -> Self {
        LdaConfig {
            alpha_sum: topics.alpha_sum,
            beta: topics.beta,
            num_workers: topics.num_workers,
            top_words: topics.top_words,
        }
    }
}

struct DocState {
    topics: Vec<usize>,
    topic_counts: Vec<usize>,
}

struct Counts {
    word_topic: Vec<Vec<usize>>, // Words x Topics
    topic_totals: Vec<usize>,
}

/// (word, old topic, new topic)
type Move = (usize, usize, usize);

pub struct GibbsLda {
    config: LdaConfig,
}

impl GibbsLda {
    pub fn new(config: LdaConfig) -> Self {
        GibbsLda { config }
    }

    fn validate(&self, corpus: &InstanceList, num_topics: usize) -> PipelineResult<()> {
        if num_topics == 0 {
            return Err(PipelineError::Engine("number of topics must be positive".into()));
        }
        if self.config.num_workers == 0 {
            return Err(PipelineError::Engine("worker count must be positive".into()));
        }
        if corpus.alphabet.is_empty() {
            return Err(PipelineError::Engine("corpus has no features to model".into()));
        }
        Ok(())
    }

    fn initialize(&self, docs: &[&[usize]], vocab_size: usize, num_topics: usize) -> (Vec<DocState>, Counts) {
        let mut counts = Counts {
            word_topic: vec![vec![0; num_topics]; vocab_size],
            topic_totals: vec![0; num_topics],
        };

        let states = docs
            .iter()
            .enumerate()
            .map(|(doc_id, doc)| {
                let mut state = DocState {
                    topics: Vec::with_capacity(doc.len()),
                    topic_counts: vec![0; num_topics],
                };
                for (pos, &word_id) in doc.iter().enumerate() {
                    let topic = (doc_id + pos) % num_topics;
                    counts.word_topic[word_id][topic] += 1;
                    counts.topic_totals[topic] += 1;
                    state.topic_counts[topic] += 1;
                    state.topics.push(topic);
                }
                state
            })
            .collect();

        (states, counts)
    }

    fn run_lda(
        &self,
        docs: &[&[usize]],
        vocab_size: usize,
        num_topics: usize,
        num_iterations: usize,
    ) -> PipelineResult<(Vec<DocState>, Counts)> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.num_workers)
            .build()
            .map_err(|e| PipelineError::Engine(format!("failed to start worker pool: {e}")))?;

        let (mut states, mut counts) = self.initialize(docs, vocab_size, num_topics);
        let shard_size = docs.len().div_ceil(self.config.num_workers).max(1);
        let alpha = self.config.alpha_sum / num_topics as f64;

        for iteration in 0..num_iterations {
            let snapshot = &counts;
            let shard_moves: Vec<Vec<Move>> = pool.install(|| {
                states
                    .par_chunks_mut(shard_size)
                    .zip(docs.par_chunks(shard_size))
                    .map(|(shard_states, shard_docs)| {
                        let mut moves = Vec::new();
                        for (state, doc) in shard_states.iter_mut().zip(shard_docs) {
                            for (pos, &word_id) in doc.iter().enumerate() {
                                let old_topic = state.topics[pos];
                                state.topic_counts[old_topic] -= 1;
                                let new_topic =
                                    self.sample_topic(word_id, old_topic, &state.topic_counts, snapshot, alpha);
                                state.topic_counts[new_topic] += 1;
                                if new_topic != old_topic {
                                    state.topics[pos] = new_topic;
                                    moves.push((word_id, old_topic, new_topic));
                                }
                            }
                        }
                        moves
                    })
                    .collect()
            });

            let mut moved = 0;
            for (word_id, old_topic, new_topic) in shard_moves.into_iter().flatten() {
                counts.word_topic[word_id][old_topic] -= 1;
                counts.word_topic[word_id][new_topic] += 1;
                counts.topic_totals[old_topic] -= 1;
                counts.topic_totals[new_topic] += 1;
                moved += 1;
            }
            if moved == 0 {
                debug!("sampling converged after {} iterations", iteration + 1);
                break;
            }
        }

        Ok((states, counts))
    }

    /// Highest-scoring topic for one token, excluding the token's own current assignment.
    fn sample_topic(
        &self,
        word_id: usize,
        current_topic: usize,
        doc_topic_counts: &[usize],
        snapshot: &Counts,
        alpha: f64,
    ) -> usize {
        let vocab_size = snapshot.word_topic.len() as f64;
        let mut best_topic = 0;
        let mut best_score = 0.0;

        for topic in 0..doc_topic_counts.len() {
            let own = usize::from(topic == current_topic);
            let word_count = snapshot.word_topic[word_id][topic].saturating_sub(own) as f64;
            let topic_total = snapshot.topic_totals[topic].saturating_sub(own) as f64;

            let word_prob = (word_count + self.config.beta) / (topic_total + vocab_size * self.config.beta);
            let doc_prob = doc_topic_counts[topic] as f64 + alpha;

            let score = word_prob * doc_prob;
            if score > best_score {
                best_score = score;
                best_topic = topic;
            }
        }

        best_topic
    }

    fn normalize_word_topic(&self, counts: &Counts, word_id: usize, topic: usize) -> f64 {
        let vocab_size = counts.word_topic.len() as f64;
        (counts.word_topic[word_id][topic] as f64 + self.config.beta)
            / (counts.topic_totals[topic] as f64 + vocab_size * self.config.beta)
    }

    fn primary_topic(state: &DocState) -> Option<usize> {
        if state.topics.is_empty() {
            return None;
        }
        let mut best = 0;
        for (topic, &count) in state.topic_counts.iter().enumerate() {
            if count > state.topic_counts[best] {
                best = topic;
            }
        }
        Some(best)
    }

    fn extract_topics(&self, corpus: &InstanceList, states: &[DocState], counts: &Counts, num_topics: usize) -> Vec<Topic> {
        (0..num_topics)
            .map(|topic| {
                let mut ranked: Vec<(usize, usize)> = counts
                    .word_topic
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row[topic] > 0)
                    .map(|(word_id, row)| (word_id, row[topic]))
                    .collect();
                ranked.sort_by(|a, b| {
                    b.1.cmp(&a.1)
                        .then_with(|| corpus.alphabet.lookup_entry(a.0).cmp(&corpus.alphabet.lookup_entry(b.0)))
                });
                ranked.truncate(self.config.top_words);

                let words = ranked
                    .iter()
                    .filter_map(|&(word_id, _)| {
                        let word = corpus.alphabet.lookup_entry(word_id)?;
                        Some((word.to_string(), self.normalize_word_topic(counts, word_id, topic)))
                    })
                    .collect();

                let documents = corpus
                    .instances
                    .iter()
                    .zip(states)
                    .filter(|(_, state)| Self::primary_topic(state) == Some(topic))
                    .map(|(instance, _)| instance.name.clone())
                    .collect();

                Topic {
                    index: topic,
                    words,
                    documents,
                }
            })
            .collect()
    }
}

impl TopicModel for GibbsLda {
    fn fit(&self, corpus: &InstanceList, num_topics: usize, num_iterations: usize) -> PipelineResult<TopicReport> {
        self.validate(corpus, num_topics)?;

        let docs: Vec<&[usize]> = corpus.instances.iter().map(|i| i.features.as_slice()).collect();
        let (states, counts) = self.run_lda(&docs, corpus.alphabet.len(), num_topics, num_iterations)?;

        Ok(TopicReport {
            topics: self.extract_topics(corpus, &states, &counts, num_topics),
        })
    }
}
