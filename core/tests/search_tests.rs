use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use triage_core::{
    Corpus, IndexConfig, InvertedIndex, QueryOutcome, ScoredResult, SearchConfig, SearchError, SimilarityService, Ticket,
    TicketRecord, Weighting,
};

fn scenario_tickets() -> Vec<Ticket> {
    vec![
        Ticket::new("T001", "Cannot reset my login password.", "Go to reset.company.com and follow the prompts."),
        Ticket::new("T002", "My VPN password expired and I cannot connect.", "Your VPN password is the same as your network password."),
        Ticket::new("T003", "Screen is flickering after Windows update.", "Roll back the graphics driver via Device Manager."),
    ]
}

const WORDS: &[&str] = &[
    "vpn", "password", "printer", "outlook", "crash", "screen", "driver", "login", "reset", "network", "email", "laptop",
    "update", "install", "license", "timeout", "slow", "wifi", "badge", "account",
];

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as usize
    }

    fn sentence(&mut self, len: usize) -> String {
        (0..len).map(|_| WORDS[self.next() % WORDS.len()]).collect::<Vec<_>>().join(" ")
    }
}

fn random_corpus(rng: &mut Lcg, size: usize) -> Vec<Ticket> {
    (0..size)
        .map(|i| {
            let len = 2 + rng.next() % 6;
            let desc = rng.sentence(len);
            let sol = rng.sentence(3);
            Ticket::new(format!("K{:03}", rng.next() % 1000 + i * 1000), desc, sol)
        })
        .collect()
}

fn assert_ranked(results: &[ScoredResult], k: usize) {
    assert!(results.len() <= k);
    let ids: HashSet<&str> = results.iter().map(|r| r.ticket_id.as_str()).collect();
    assert_eq!(ids.len(), results.len(), "duplicate ticket ids");
    for w in results.windows(2) {
        let ordered = w[0].score > w[1].score || (w[0].score == w[1].score && w[0].ticket_id < w[1].ticket_id);
        assert!(ordered, "{:?} before {:?}", w[0], w[1]);
    }
    assert!(results.iter().all(|r| r.score >= 0.0));
}

#[test]
fn password_scenario_ranks_login_or_vpn_first() {
    for weighting in [Weighting::TfIdf, Weighting::bm25()] {
        let cfg = SearchConfig { weighting, ..Default::default() };
        let svc = SimilarityService::with_tickets(cfg, scenario_tickets());
        let results = svc.search("I forgot my password and cannot log in", 5).unwrap();
        assert!(!results.is_empty());
        assert!(["T001", "T002"].contains(&results[0].ticket_id.as_str()), "{weighting:?}: {results:?}");
        assert!(results.iter().all(|r| r.ticket_id != "T003"));
    }
}

#[test]
fn empty_query_is_empty_not_error() {
    let svc = SimilarityService::with_tickets(SearchConfig::default(), scenario_tickets());
    assert_eq!(svc.search("", 5), Ok(vec![]));
    assert_eq!(svc.query("", 5), Ok(QueryOutcome::Empty));
}

#[test]
fn short_query_floor() {
    let svc = SimilarityService::with_tickets(SearchConfig::default(), scenario_tickets());
    // one surviving token is below the default minimum of two
    assert_eq!(svc.query("password", 5), Ok(QueryOutcome::Empty));
    assert_eq!(svc.query("the my and password", 5), Ok(QueryOutcome::Empty));
    let lenient = SimilarityService::with_tickets(SearchConfig { min_query_tokens: 1, ..Default::default() }, scenario_tickets());
    assert_eq!(lenient.search("password", 5).unwrap().len(), 2);
}

#[test]
fn results_are_bounded_distinct_and_ordered() {
    let mut rng = Lcg(7);
    for round in 0..25 {
        let tickets = random_corpus(&mut rng, 5 + round * 3);
        for weighting in [Weighting::TfIdf, Weighting::bm25()] {
            let svc = SimilarityService::with_tickets(SearchConfig { weighting, ..Default::default() }, tickets.clone());
            for k in [1, 3, 10] {
                let q = rng.sentence(4);
                let results = svc.search(&q, k).unwrap();
                assert_ranked(&results, k);
            }
        }
    }
}

#[test]
fn building_twice_gives_identical_results() {
    let mut rng = Lcg(42);
    let tickets = random_corpus(&mut rng, 40);
    let corpus: Corpus = tickets.iter().cloned().collect();
    let a = InvertedIndex::build(&corpus, &IndexConfig::default()).index;
    let b = InvertedIndex::build(&corpus, &IndexConfig::default()).index;
    assert_eq!(a, b);

    let s1 = SimilarityService::with_tickets(SearchConfig::default(), tickets.clone());
    let s2 = SimilarityService::with_tickets(SearchConfig::default(), tickets);
    for _ in 0..20 {
        let q = rng.sentence(3);
        assert_eq!(s1.search(&q, 5), s2.search(&q, 5));
    }
}

#[test]
fn repeated_queries_on_one_service_are_bit_identical() {
    for seed in 1..=20u64 {
        let mut rng = Lcg(seed);
        let tickets = random_corpus(&mut rng, 80);
        for weighting in [Weighting::TfIdf, Weighting::bm25()] {
            let svc = SimilarityService::with_tickets(SearchConfig { weighting, ..Default::default() }, tickets.clone());
            let q = "vpn password printer outlook crash screen driver login";
            let first = svc.search(q, 10).unwrap();
            let first_bits: Vec<(String, u32)> = first.iter().map(|r| (r.ticket_id.clone(), r.score.to_bits())).collect();
            for _ in 0..50 {
                let again: Vec<(String, u32)> =
                    svc.search(q, 10).unwrap().iter().map(|r| (r.ticket_id.clone(), r.score.to_bits())).collect();
                assert_eq!(again, first_bits, "seed {seed} {weighting:?}");
            }
            assert_ranked(&first, 10);
        }
    }
}

#[test]
fn exact_match_ticket_appears_after_rebuild() {
    let mut rng = Lcg(99);
    let svc = SimilarityService::with_tickets(SearchConfig::default(), random_corpus(&mut rng, 30));
    let q = "badge reader rejects my access card";
    let before = svc.search(q, 50).unwrap();
    assert!(before.iter().all(|r| r.ticket_id != "NEW"));

    let report = svc.ingest(vec![TicketRecord::from(Ticket::new("NEW", q, "Re-enroll the card at security"))]);
    assert_eq!(report.load.inserted, 1);
    let after = svc.search(q, 50).unwrap();
    assert_eq!(after[0].ticket_id, "NEW");
    assert!(after.len() >= before.len());
}

#[test]
fn in_flight_search_keeps_its_snapshot_across_rebuild() {
    let svc = Arc::new(SimilarityService::with_tickets(SearchConfig::default(), scenario_tickets()));
    let snapshot = svc.snapshot().unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let svc = Arc::clone(&svc);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            svc.ingest(vec![TicketRecord::from(Ticket::new("T004", "Forgot password cannot log in", ""))])
        })
    };
    barrier.wait();
    let old = svc.query_snapshot(&snapshot, "I forgot my password and cannot log in", 5).unwrap().into_results();
    let report = writer.join().unwrap();

    assert_eq!(report.generation, 2);
    assert_eq!(snapshot.generation, 1);
    assert!(old.iter().all(|r| r.ticket_id != "T004"));
    let fresh = svc.search("I forgot my password and cannot log in", 5).unwrap();
    assert_eq!(fresh[0].ticket_id, "T004");
}

#[test]
fn concurrent_readers_during_rebuilds_never_fail() {
    let svc = Arc::new(SimilarityService::with_tickets(SearchConfig::default(), scenario_tickets()));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for _ in 0..200 {
                    let r = svc.search("vpn password expired again", 3).unwrap();
                    assert_ranked(&r, 3);
                }
            })
        })
        .collect();
    for i in 0..20 {
        svc.ingest(vec![TicketRecord::from(Ticket::new(format!("R{i:02}"), "vpn password expired", ""))]);
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(svc.stats().tickets, 23);
}

#[test]
fn similar_issues_carry_ticket_fields() {
    let tickets = scenario_tickets().into_iter().map(|t| t.with_category("Login & Auth").with_priority("High"));
    let svc = SimilarityService::with_tickets(SearchConfig::default(), tickets);
    let issues = svc.similar_issues("vpn password expired", 4).unwrap();
    assert_eq!(issues[0].ticket_id, "T002");
    assert!(issues[0].solution_text.contains("network password"));
    assert_eq!(issues[0].category.as_deref(), Some("Login & Auth"));
}

#[test]
fn live_search_requires_ten_words() {
    let svc = SimilarityService::with_tickets(SearchConfig::default(), scenario_tickets());
    let short = svc.live_search("vpn password expired cannot connect").unwrap();
    assert!(short.issues.is_empty());
    let long = svc.live_search("my vpn password expired this morning and now I cannot connect from home").unwrap();
    assert!(long.seq > short.seq);
    assert!(!long.issues.is_empty() && long.issues.len() <= 3);
    assert_eq!(long.issues[0].ticket_id, "T002");
}

#[test]
fn not_ready_until_corpus_has_tickets() {
    let svc = SimilarityService::new(SearchConfig::default());
    assert_eq!(svc.search("vpn password", 3), Err(SearchError::NotReady));
    let report = svc.ingest(vec![TicketRecord::default()]);
    assert_eq!(report.load.skip_count(), 1);
    assert!(!svc.is_ready());
    svc.ingest(scenario_tickets().into_iter().map(TicketRecord::from));
    assert!(svc.is_ready());
}
