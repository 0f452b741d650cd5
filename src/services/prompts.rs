//! Prompt construction for the assistant and the simulated user.

use crate::error::Result;
use crate::schemas::SgdCatalog;
use crate::types::goal::{DatasetFamily, DialogueGoal, AGENT_NAME};

const MULTIWOZ_OVERVIEW: &str = "You are an intelligent AI Assistant to help the user complete complex tasks. The task may contain several sub-tasks, and you first determine which sub-tasks are involved in the user's utterance, and then complete the user's request according to the instructions of the corresponding sub-tasks.

# Task Overall:

You specialize in travel guidance in Cambridge, and are able to find the venue according to the user's constraints and make reservations or book a train or taxi.

Each sub-task contains a Task Description with the constraints used for searching and booking, the Task Functions that can be called, and the Task Logic to follow.";

const RESTAURANT_TASK: &str = "# Sub-task: Restaurant

## Task Description

The AI Assistant helps the user find a restaurant and/or make a reservation.
The search constraints include the area, the price range, the food type and sometimes the name of the restaurant.
The reservation constraints include the number of people, the day in a week and the time of the reservation.

## Task Functions

- query_restaurants: Use an SQL statement to query the restaurants in the database to find proper information.
- book_restaurant: Book a restaurant with certain requirements.

## Task Logic

- Query the restaurants that meet the constraints, and recommend the restaurant names to the user for choosing.
- Reservations can only be made if the restaurant name and all the reservation constraints (people, day, time) are specified.";

const HOTEL_TASK: &str = "# Sub-task: Hotel

## Task Description

The AI Assistant helps the user find a hotel and/or make a reservation.
The search constraints include the area, the price range, the type, free parking, free internet, the star rating and sometimes the name of the hotel.
The reservation constraints include the number of people, the day when the stay starts and the number of days to stay.

## Task Functions

- query_hotels: Use an SQL statement to query the hotels in the database to find proper information.
- book_hotel: Book a hotel with certain requirements.

## Task Logic

- Query the hotels that meet the constraints, and recommend the hotel names to the user for choosing.
- If there are too many hotels, ask the user to provide more constraints.
- Reservations can only be made if the hotel name and all the reservation constraints (people, day, stay) are specified.";

const ATTRACTION_TASK: &str = "# Sub-task: Attraction

## Task Description

The AI Assistant helps the user find an attraction.
The search constraints include the area, the type and sometimes the name of the attraction.

## Task Functions

- query_attractions: Use an SQL statement to query the attractions in the database to find proper information.

## Task Logic

- Query the attractions that meet the constraints, and recommend the attraction names to the user for choosing.
- When the user names an attraction, tell the user the information they ask for.";

const TRAIN_TASK: &str = "# Sub-task: Train

## Task Description

The AI Assistant helps the user find a train and/or buy tickets.
The search constraints include the departure, the destination, the day, the leave time and the arrive time.
The booking constraint is the number of tickets.

## Task Functions

- query_trains: Use an SQL statement to query the trains in the database to find proper information.
- buy_train_tickets: Buy train tickets.

## Task Logic

- Query the trains that meet the constraints, and recommend the train ids to the user for choosing.
- Tickets can only be bought if the train id and the number of tickets are specified.";

const TAXI_TASK: &str = "# Sub-task: Taxi

## Task Description

The AI Assistant helps the user book a taxi.
The booking constraints include the departure, the destination and the leave time or the arrive time.

## Task Functions

- book_taxi: Book a taxi with certain requirements.

## Task Logic

- The departure and the destination must be names or addresses of known venues.
- A taxi can only be booked if the departure, the destination and one of the leave time or arrive time are specified.";

const REMEMBER: &str = "# Remember

- Don't make assumptions about what values to plug into functions. Ask for clarification if any parameter is missing or ambiguous.
- You must not call the same function with the same parameters again and again.
- When finishing the user's goals, say goodbye to the user and finish the dialogue.";

const SGD_OVERVIEW: &str = "You are an intelligent AI Assistant to help the user complete complex tasks. There are many services to fulfill the user's goals. Each service consists of multiple functions that the AI Assistant can call. The AI Assistant can choose to call a function in order to provide information or make a transaction for the user.

The functions are divided into query function and transaction function. The query function will return the records in the database that meets the conditions, and the transaction function will return the corresponding reference number if calling successfully.

Today is 2019-03-01, Friday. (This Saturday is 2019-03-02. This Sunday is 2019-03-03.)
When specifying a date type parameter without given full date, prefix as \"2019-03-xx\".";

const SGD_REMEMBER: &str = "# Remember

- Don't make assumptions about what values to plug into functions. Ask for clarification if any parameter is missing or ambiguous.
- Before calling a transaction function for the user, such as transfer money and book restaurants, the AI Assistant MUST show all the function parameters and confirm with the user.
- You must not call the same function with the same parameters again and again.
- When finishing the user's goals, say goodbye to the user and finish the dialogue.";

/// System prompt of the four-domain assistant covering the given domains
pub fn multiwoz_system_prompt<S: AsRef<str>>(domains: &[S]) -> String {
    let mut sections = vec![MULTIWOZ_OVERVIEW];
    for domain in domains {
        let task = match domain.as_ref() {
            "restaurant" => RESTAURANT_TASK,
            "hotel" => HOTEL_TASK,
            "attraction" => ATTRACTION_TASK,
            "train" => TRAIN_TASK,
            "taxi" => TAXI_TASK,
            _ => continue,
        };
        sections.push(task);
    }
    sections.push(REMEMBER);
    sections.join("\n\n")
}

/// System prompt listing each service and its functions
pub fn sgd_system_prompt<S: AsRef<str>>(catalog: &SgdCatalog, services: &[S]) -> Result<String> {
    let mut sections = vec![SGD_OVERVIEW.to_string()];
    for name in services {
        let service = catalog.service(name.as_ref())?;
        let functions = service
            .intents
            .iter()
            .map(|intent| {
                format!(
                    "- {}_{}: {}. ({} function)",
                    service.service_name,
                    intent.name,
                    intent.description,
                    if intent.is_transactional {
                        "Transaction"
                    } else {
                        "Query"
                    }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!(
            "# Service: {}\n\n## Description\n\n{}\n\n## Functions\n\n{}",
            service.service_name, service.description, functions
        ));
    }
    sections.push(SGD_REMEMBER.to_string());
    Ok(sections.join("\n\n"))
}

const USER_INTRO: &str = "You are a dialogue simulator where you act as a user to talk to an AI assistant to complete some tasks.

You should carefully read and understand the User Goals below, then talk with the AI Assistant and gradually express the intents in the goals. Your purpose is to let the user achieve the goals as much as possible.

Note that the AI Assistant is not perfect. It may make various mistakes, including ignoring the user's requests, executing the wrong instructions, forgetting early conversation content, etc. The user you play should talk to the AI Assistant as patiently as possible, remind him to correct when you find that the AI assistant made a mistake, and complete the task as much as possible.";

const USER_MULTIWOZ_HINT: &str = "When asking some information of a venue (restaurant, hotel, attraction) or a train, the user should specify the name or train id he chooses.";

const USER_SGD_HINT: &str = "When the AI Assistant can not find the objects that the user wants, the user may try to use the canonical format in the parentheses, like NYC to New York. When the AI Assistant still can not find any object, the user should stop trying.";

const USER_RULES: &str = "When the dialogue goals are completed or are not been completed, the user will output \"Dialogue Ends\" to indicate the end of the dialogue. The user doesn't need to try conditions other than the dialogue goals.

The user has a clear goal in mind, so he does not need to ask the AI assistant that \"Is there anything else I need to know?\".

The user does not need to talk too much with the AI assistant. If the task goals are completed, please end the conversation as soon as possible.

There is also a reference dialogue example to achieve the goals. The simulator user may learn from the language style and dialogue strategy. The final simulated dialogue style should be similar to the reference dialogue style.";

/// Prompt asking the user model for its next utterance.
///
/// `history` holds `Speaker: text` lines of the conversation so far.
pub fn user_prompt(goal: &DialogueGoal, history: &[String], agent_utterance: &str) -> String {
    let hint = match goal.family {
        DatasetFamily::Multiwoz => USER_MULTIWOZ_HINT,
        DatasetFamily::Sgd => USER_SGD_HINT,
    };
    format!(
        "{}\n\n{}\n\n{}\n\n\nUser Goals:\n\n{}\n\nReference dialogue:\n\n{}\n\nCurrent conversation:\n{}\n{}: {}\nUser:",
        USER_INTRO,
        hint,
        USER_RULES,
        goal.goal_text,
        goal.reference_text(),
        history.join("\n"),
        AGENT_NAME,
        agent_utterance
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::sgd::tests::buses_catalog;
    use crate::types::goal::ReferenceUtterance;

    #[test]
    fn test_multiwoz_prompt_covers_requested_domains() {
        let prompt = multiwoz_system_prompt(&["hotel", "taxi"]);
        assert!(prompt.contains("# Sub-task: Hotel"));
        assert!(prompt.contains("# Sub-task: Taxi"));
        assert!(!prompt.contains("# Sub-task: Restaurant"));
        assert!(prompt.ends_with("finish the dialogue."));
    }

    #[test]
    fn test_sgd_prompt_lists_functions() {
        let prompt = sgd_system_prompt(&buses_catalog(), &["Buses_1"]).unwrap();
        assert!(prompt.contains("# Service: Buses_1"));
        assert!(prompt.contains("- Buses_1_FindBus: Find a bus journey for a given pair of cities. (Query function)"));
        assert!(prompt.contains("- Buses_1_BuyBusTicket: Buy tickets for a bus journey. (Transaction function)"));
        assert!(sgd_system_prompt(&buses_catalog(), &["Trains_1"]).is_err());
    }

    #[test]
    fn test_user_prompt_ends_with_agent_turn() {
        let goal = DialogueGoal {
            id: "SNG0001.json".to_string(),
            family: DatasetFamily::Multiwoz,
            services: vec!["restaurant".to_string()],
            goal_text: "You are looking for a restaurant.".to_string(),
            first_utterance: "I need food.".to_string(),
            reference: vec![ReferenceUtterance {
                speaker: "User".to_string(),
                text: "I need food.".to_string(),
            }],
        };
        let history = vec!["User: I need food.".to_string()];
        let prompt = user_prompt(&goal, &history, "What area?");
        assert!(prompt.contains("User Goals:\n\nYou are looking for a restaurant."));
        assert!(prompt.contains("Reference dialogue:\n\nUser: I need food."));
        assert!(prompt.ends_with("Current conversation:\nUser: I need food.\nAI Assistant: What area?\nUser:"));
    }
}
