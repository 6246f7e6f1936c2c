mod attachments;
mod tasks;
mod users;
