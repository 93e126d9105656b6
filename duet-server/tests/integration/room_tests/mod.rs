mod test_room_capacity;
mod test_room_forwarding;
mod test_room_lifecycle;
