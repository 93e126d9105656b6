mod test_chat_echo;
