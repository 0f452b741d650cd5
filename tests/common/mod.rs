#![allow(dead_code)]

use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tod_bench::{
    schemas::multiwoz,
    services::{prompts::multiwoz_system_prompt, ChatCompletionRequest},
    AgentError, BookingStore, ChatModel, Completion, FunctionAgent, FunctionDispatcher, Result,
    VenueStore,
};

/// Chat model replaying canned completions in order and recording every
/// request it receives
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = Completion>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: AgentError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from(vec![Err(error)])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".to_string())))
    }
}

pub fn venue_store() -> VenueStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE restaurant (id INTEGER PRIMARY KEY, name TEXT, area TEXT,
            pricerange TEXT, food TEXT, phone TEXT, postcode TEXT, address TEXT);
        CREATE TABLE hotel (id INTEGER PRIMARY KEY, name TEXT, type TEXT, area TEXT,
            internet TEXT, parking TEXT, pricerange TEXT, stars TEXT, phone TEXT,
            address TEXT, postcode TEXT);
        CREATE TABLE attraction (id INTEGER PRIMARY KEY, name TEXT, type TEXT, area TEXT,
            phone TEXT, address TEXT, postcode TEXT, entrance_fee TEXT);
        CREATE TABLE train (id INTEGER PRIMARY KEY, trainID TEXT, departure TEXT,
            destination TEXT, day TEXT, leaveAt TEXT, arriveBy TEXT, price TEXT,
            duration TEXT);
        INSERT INTO restaurant (name, area, pricerange, food, phone, postcode, address) VALUES
            ('pizza hut', 'centre', 'cheap', 'italian', '01223323737', 'cb21ab', 'regent street city centre'),
            ('rosa''s kitchen', 'west', 'cheap', 'spanish', '01223000000', 'cb30aa', '1 market hill');
        INSERT INTO hotel (name, type, area, internet, parking, pricerange, stars, phone, address, postcode) VALUES
            ('acorn guest house', 'guesthouse', 'north', 'yes', 'yes', 'moderate', '4', '01223353888', '154 chesterton road', 'cb41da');
        INSERT INTO attraction (name, type, area, phone, address, postcode, entrance_fee) VALUES
            ('kings college', 'college', 'centre', '01223331100', 'king''s parade', 'cb21st', 'free');
        INSERT INTO train (trainID, departure, destination, day, leaveAt, arriveBy, price, duration) VALUES
            ('tr1234', 'cambridge', 'london kings cross', 'monday', '05:00', '05:51', '23.60 pounds', '51 minutes');
        "#,
    )
    .unwrap();

    let mut insert = conn
        .prepare("INSERT INTO restaurant (name, area, pricerange, food) VALUES (?1, 'east', 'cheap', 'indian')")
        .unwrap();
    for i in 1..=12 {
        insert.execute([format!("east diner {}", i)]).unwrap();
    }
    drop(insert);

    VenueStore::from_connection(conn).unwrap()
}

/// An assistant over every four-domain function, with an in-memory
/// booking store
pub fn multiwoz_agent(model: Arc<dyn ChatModel>) -> (FunctionAgent, Arc<FunctionDispatcher>) {
    let venues = Arc::new(venue_store());
    let bookings = Arc::new(BookingStore::in_memory().unwrap());
    let registry = multiwoz::build_registry(&venues).unwrap();
    let dispatcher = Arc::new(FunctionDispatcher::new(&registry, venues, bookings));
    let prompt = multiwoz_system_prompt(&multiwoz::SERVICE_NAMES[..]);
    let agent = FunctionAgent::new(model, registry, dispatcher.clone(), prompt);
    (agent, dispatcher)
}

/// The reference number embedded in a success message
pub fn reference_in(result: &str) -> String {
    result
        .trim_end_matches('.')
        .rsplit(' ')
        .next()
        .unwrap()
        .to_string()
}
